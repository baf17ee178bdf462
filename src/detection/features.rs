//! Static features extracted from an uploaded file

use sha2::{Digest, Sha256};

use super::rules::SUSPICIOUS_MARKERS;

/// Hex SHA-256 of the content
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Shannon entropy of the bytes, normalized to [0, 1] (8 bits = 1.0)
pub fn normalized_entropy(content: &[u8]) -> f64 {
    if content.is_empty() {
        return 0.0;
    }

    let mut counts = [0usize; 256];
    for &byte in content {
        counts[byte as usize] += 1;
    }

    let len = content.len() as f64;
    let bits: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum();

    (bits / 8.0).clamp(0.0, 1.0)
}

/// Number of distinct suspicious markers present in the content
pub fn count_suspicious_markers(content: &[u8]) -> usize {
    let lowered = String::from_utf8_lossy(content).to_ascii_lowercase();
    SUSPICIOUS_MARKERS
        .iter()
        .filter(|marker| lowered.contains(*marker))
        .count()
}
