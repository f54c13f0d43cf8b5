pub mod contingency_report;
