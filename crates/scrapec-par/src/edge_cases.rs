//! Edge case tests for scrapec-par
