//! Scan outcome rendering (human-readable or JSON).

use anyhow::Result;
use chrono::{DateTime, Utc};
use hollowscan_core::{ScanResult, Verdict};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::commands::hex_utils::format_hex_address;

/// One scanned address and what was found there
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub scanned_at: DateTime<Utc>,
    pub address: String,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn from_scan(address: u64, scan: hollowscan_core::Result<Option<ScanResult>>) -> Self {
        let (verdict, result, error) = match scan {
            Ok(Some(result)) => (result.verdict, Some(result), None),
            Ok(None) => (Verdict::NotSuspicious, None, None),
            Err(e) => (Verdict::Error, None, Some(e.to_string())),
        };
        Self {
            scanned_at: Utc::now(),
            address: format_hex_address(address),
            verdict,
            result,
            error,
        }
    }
}

pub fn print(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    let verdict = outcome.verdict.to_string().to_uppercase();
    let verdict = match outcome.verdict {
        Verdict::Suspicious => verdict.red().bold().to_string(),
        Verdict::NotSuspicious => verdict.green().to_string(),
        Verdict::Error => verdict.yellow().to_string(),
    };
    println!("Region {}: {}", outcome.address, verdict);

    if let Some(error) = &outcome.error {
        println!("  error            {}", error);
    }

    let Some(result) = &outcome.result else {
        return Ok(());
    };
    let artefacts = &result.artefacts;
    println!("  target           {}", format_hex_address(result.target_address));
    println!(
        "  section table    +0x{:X} ({} sections)",
        artefacts.section_table_offset, artefacts.section_count
    );
    match artefacts.file_header_offset {
        Some(offset) => println!("  file header      +0x{:X}", offset),
        None => println!("  file header      not found"),
    }
    println!("  image base       +0x{:X}", artefacts.image_base_offset);
    println!("  sampled size     0x{:X}", result.sampled_size);
    println!("  estimated size   0x{:X}", artefacts.estimated_image_size);
    println!("  image size       0x{:X}", result.final_image_size);
    println!(
        "  manually loaded  {}",
        if result.is_manually_loaded { "yes" } else { "no" }
    );
    println!("  protection       0x{:X}", result.protection);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_for_negative_scan() {
        let outcome = Outcome::from_scan(0x10000, Ok(None));
        assert_eq!(outcome.verdict, Verdict::NotSuspicious);
        assert_eq!(outcome.address, "0x10000");

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["verdict"], "NotSuspicious");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_outcome_for_failed_fetch() {
        let err = hollowscan_core::Error::RegionQueryFailed { address: 0x10000 };
        let outcome = Outcome::from_scan(0x10000, Err(err));
        assert_eq!(outcome.verdict, Verdict::Error);
        assert_eq!(
            outcome.error.as_deref(),
            Some("No queryable region at address 0x10000")
        );
    }
}
