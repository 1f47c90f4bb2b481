/// Display version information
pub fn execute() {
    println!("coffer {}", env!("CARGO_PKG_VERSION"));
    println!("Policy-governed multi-signer treasury");
    println!("Snapshot schema version {}", coffer::serialization::SCHEMA_VERSION);
}
