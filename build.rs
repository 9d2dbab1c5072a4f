use chrono::{DateTime, Utc};

fn main() {
    // Build time for the CLI version line, honouring SOURCE_DATE_EPOCH / 构建时间(支持可复现构建)
    let built_at = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);
    println!(
        "cargo:rustc-env=BUILD_TIME={}",
        built_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
}
