//! Distribution list ingestion
//!
//! Reads a comma separated list with a header row naming at least the
//! `address` and `amount` columns. Columns may appear in any order and extra
//! columns are ignored. Amounts are parsed to their canonical integer here so
//! the leaf encoder never sees a textual representation.

use std::io::BufRead;
use std::path::Path;

use airdrop_types::{Address, Amount, Entitlement};
use tracing::{debug, warn};

use crate::{CliError, Result};

/// Read entitlements from a CSV file
pub fn read_entitlements(path: &Path) -> Result<Vec<Entitlement>> {
    let file = std::fs::File::open(path)?;
    parse_entitlements(std::io::BufReader::new(file))
}

/// Parse entitlements from CSV text
///
/// Rows with an empty address or amount are skipped with a warning. A value
/// that is present but malformed aborts the whole read.
pub fn parse_entitlements<R: BufRead>(reader: R) -> Result<Vec<Entitlement>> {
    let mut lines = reader.lines().enumerate();

    let (address_col, amount_col) = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                break header_columns(&line)?;
            }
            None => return Err(CliError::EmptyInput),
        }
    };

    let mut entitlements = Vec::new();
    for (index, line) in lines {
        let line = line?;
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let address = fields.get(address_col).copied().unwrap_or("");
        let amount = fields.get(amount_col).copied().unwrap_or("");
        if address.is_empty() || amount.is_empty() {
            warn!(line = line_no, row = %line, "skipping row with missing field");
            continue;
        }

        let recipient = Address::from_hex(address)
            .map_err(|source| CliError::InvalidRow { line: line_no, source })?;
        let amount = amount
            .parse::<Amount>()
            .map_err(|source| CliError::InvalidRow { line: line_no, source })?;

        entitlements.push(Entitlement::new(recipient, amount));
    }

    debug!(count = entitlements.len(), "entitlements ingested");
    Ok(entitlements)
}

fn header_columns(line: &str) -> Result<(usize, usize)> {
    let names: Vec<String> = line
        .split(',')
        .map(|s| s.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
        .collect();
    let position = |name: &'static str| {
        names
            .iter()
            .position(|n| n == name)
            .ok_or(CliError::MissingColumn(name))
    };
    Ok((position("address")?, position("amount")?))
}
