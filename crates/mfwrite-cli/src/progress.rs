//! Progress display for dump writes

use indicatif::{ProgressBar, ProgressStyle};
use mfwrite_core::{ProgressCallback, WriteProgress};

/// Create a progress bar counting written blocks
pub fn create_write_progress_bar(total_blocks: usize, silent: bool) -> ProgressBar {
    if silent {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total_blocks as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} Writing [{bar:40.cyan/blue}] {pos}/{len} blocks {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb
}

/// Progress callback driving `pb`
pub fn progress_callback(pb: &ProgressBar) -> ProgressCallback {
    let pb = pb.clone();
    Box::new(move |progress: &WriteProgress| {
        pb.set_position(progress.blocks_written as u64);
        pb.set_message(format_position(progress));
    })
}

/// Short label for the block just written
pub fn format_position(progress: &WriteProgress) -> String {
    format!("(sector {}, block {})", progress.sector, progress.block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(blocks_written: usize) -> WriteProgress {
        WriteProgress {
            blocks_written,
            total_blocks: 4,
            sector: 2,
            block: 1,
        }
    }

    #[test]
    fn test_format_position() {
        assert_eq!(format_position(&progress(1)), "(sector 2, block 1)");
    }

    #[test]
    fn test_progress_callback_moves_bar() {
        let pb = ProgressBar::hidden();
        pb.set_length(4);
        let callback = progress_callback(&pb);
        callback(&progress(3));
        assert_eq!(pb.position(), 3);
    }

    #[test]
    fn test_silent_bar_is_hidden() {
        assert!(create_write_progress_bar(10, true).is_hidden());
    }
}
