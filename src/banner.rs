// src/banner.rs

/// Prints the application startup banner to the console.
pub fn print_banner() {
    // Using a raw string literal for the multi-line banner
    let banner = r#"
                 _                     _
  ___ ___   __| | ___  _____   ____ _| |
 / __/ _ \ / _` |/ _ \/ _ \ \ / / _` | |
| (_| (_) | (_| |  __/  __/\ V / (_| | |
 \___\___/ \__,_|\___|\___| \_/ \__,_|_|

    Sandboxed Code Generation Benchmark
"#;
    println!("{}", banner);
}
