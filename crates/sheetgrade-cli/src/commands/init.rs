//! The `sheetgrade init` command.

use std::path::Path;

use anyhow::{Context, Result};

const STARTER_CONFIG: &str = r#"# sheetgrade configuration

enabled_strategies = ["pattern", "visual"]
max_file_size_mb = 10
page_height = 1400
store_dir = "./sheetgrade-history"

[scoring]
method = "ai"
total_points = 100.0
pass_threshold = 60.0
partial_threshold = 0.5

[strategies.pattern]
type = "pattern"
options = 4

[strategies.visual]
type = "visual"
options = 4

# Uncomment to enable the remote OCR strategy:
# [strategies.ocr]
# type = "ocr"
# endpoint = "https://ocr.example.com"
# api_key = "${SHEETGRADE_OCR_KEY}"
"#;

const EXAMPLE_KEY: &str = r#"[answer_key]
name = "Example Quiz"
default_points = 4.0

[[questions]]
index = 1
expected = "B"
subject = "algebra"

[[questions]]
index = 2
expected = "photosynthesis"
subject = "biology"

[[questions]]
index = 3
expected = "42"
"#;

pub fn execute() -> Result<()> {
    write_if_absent(Path::new("sheetgrade.toml"), STARTER_CONFIG)?;
    write_if_absent(Path::new("example-key.toml"), EXAMPLE_KEY)?;

    println!("\nNext steps:");
    println!("  1. Adjust sheetgrade.toml to taste");
    println!("  2. sheetgrade validate --key-manifest example-key.toml");
    println!("  3. sheetgrade evaluate --sheet scan.png --key-manifest example-key.toml");
    Ok(())
}

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping", path.display());
        return Ok(());
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
