mod alerts;
mod write_flows;
