use iegm_core::metadata::{detect_indicator, detect_year};
use iegm_core::DataLoader;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let path = match std::env::args().nth(1) {
        Some(p) => PathBuf::from(p),
        None => {
            println!("Usage: sniff_export <file.csv>");
            return Ok(());
        }
    };

    let Some(loaded) = DataLoader::new().sniff(&path)? else {
        println!("No encoding/separator combination produced more than one column");
        return Ok(());
    };

    println!("File: {}", loaded.file_name());
    println!("Encoding: {} | Separator: '{}'", loaded.encoding, loaded.separator);
    println!("Records: {} | Columns: {}", loaded.frame.height(), loaded.frame.width());
    println!("Columns: {:?}", loaded.column_names());
    println!("Year: {}", detect_year(&loaded.frame)?);
    println!("Indicator: {}", detect_indicator(&loaded.frame)?);

    Ok(())
}
