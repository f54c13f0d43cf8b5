//! Contingency violation CSV output: the one output writer the core owns
//! directly (general file/XML readers and other dump formats stay a
//! component-library concern). Built against the `csv` crate's `Writer`.

use std::io::Write;

use csv::Writer;

use crate::core::contingency::Contingency;

/// Builds the header row for the full form: `id, name, events, busV_1..n,
/// busA_1..n, lineFlow_1..m, violations`.
fn full_header(bus_names: &[String], link_names: &[String]) -> Vec<String> {
    let mut header = vec!["id".to_string(), "name".to_string(), "events".to_string()];
    header.extend(bus_names.iter().map(|n| format!("busV_{n}")));
    header.extend(bus_names.iter().map(|n| format!("busA_{n}")));
    header.extend(link_names.iter().map(|n| format!("lineFlow_{n}")));
    header.push("violations".to_string());
    header
}

/// The compact form's header: omits the voltage/angle/flow block.
fn compact_header() -> Vec<String> {
    vec!["id".to_string(), "name".to_string(), "events".to_string(), "violations".to_string()]
}

fn events_field(con: &Contingency) -> String {
    con.event_list
        .iter()
        .flat_map(|stage| stage.iter())
        .map(|e| e.name())
        .collect::<Vec<_>>()
        .join(";")
}

fn violations_field(con: &Contingency) -> String {
    con.violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(";")
}

fn full_row(con: &Contingency) -> Vec<String> {
    let mut row = vec![con.id.to_string(), con.name.clone(), events_field(con)];
    row.extend(con.bus_voltages.iter().map(|v| v.to_string()));
    row.extend(con.bus_angles.iter().map(|v| v.to_string()));
    row.extend(con.line_flows.iter().map(|v| v.to_string()));
    row.push(violations_field(con));
    row
}

fn compact_row(con: &Contingency) -> Vec<String> {
    vec![con.id.to_string(), con.name.clone(), events_field(con), violations_field(con)]
}

/// Writes the full CSV form (header plus one row per contingency, in the
/// order given) — bus/link names are only needed to label the per-bus and
/// per-link columns; the header is written once, at the first call.
pub fn write_contingency_csv<W: Write>(
    writer: W,
    contingencies: &[Contingency],
    bus_names: &[String],
    link_names: &[String],
) -> csv::Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(full_header(bus_names, link_names))?;
    for con in contingencies {
        wtr.write_record(full_row(con))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the compact CSV form: `id, name, events, violations` only.
pub fn write_contingency_csv_compact<W: Write>(writer: W, contingencies: &[Contingency]) -> csv::Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(compact_header())?;
    for con in contingencies {
        wtr.write_record(compact_row(con))?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contingency::{ContingencyMode, Violation, ViolationCode};

    fn sample() -> Contingency {
        let mut con = Contingency::new(1, ContingencyMode::Line);
        con.name = "line-3".to_string();
        con.bus_voltages = vec![1.0, 0.95];
        con.bus_angles = vec![0.0, -0.02];
        con.line_flows = vec![0.5];
        con.violations.push(Violation {
            object_name: "bus2".to_string(),
            level: 0.6,
            limit: 0.7,
            percent_violation: 0.14,
            contingency_id: 1,
            code: ViolationCode::VoltageUnderLimit,
            severity: 1,
        });
        con
    }

    #[test]
    fn full_csv_has_one_header_and_one_row_per_contingency() {
        let con = sample();
        let mut buf = Vec::new();
        write_contingency_csv(&mut buf, &[con], &["b1".to_string(), "b2".to_string()], &["l1".to_string()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("busV_b1"));
        assert!(lines[0].contains("lineFlow_l1"));
        assert!(lines[1].starts_with("1,line-3"));
    }

    #[test]
    fn compact_csv_omits_the_telemetry_block() {
        let con = sample();
        let mut buf = Vec::new();
        write_contingency_csv_compact(&mut buf, &[con]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "id,name,events,violations");
    }

    #[test]
    fn violation_text_appears_in_the_violations_column() {
        let con = sample();
        let mut buf = Vec::new();
        write_contingency_csv_compact(&mut buf, &[con]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("VoltageUnderLimit"));
    }
}
