use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command};

pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTime::new(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        )))
        .with_writer(std::io::stderr)
        .init();
}

pub fn format_number(num: u64) -> String {
    let digits = num.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1000.0;
    let bytes_f = bytes as f64;

    if bytes_f < KB {
        format!("{} B", bytes)
    } else if bytes_f < KB * 100.0 {
        format!("{:.1} kB", bytes_f / KB)
    } else if bytes_f < KB * KB {
        format!("{:.0} kB", bytes_f / KB)
    } else if bytes_f < KB * KB * 100.0 {
        format!("{:.1} MB", bytes_f / (KB * KB))
    } else {
        format!("{:.0} MB", bytes_f / (KB * KB))
    }
}

pub fn validate_args(args: &Args) -> anyhow::Result<()> {
    if let Some(workers) = args.workers {
        if workers == 0 {
            anyhow::bail!("--workers must be greater than 0");
        }
    }

    match &args.command {
        Command::Overview { top, .. } => {
            if *top == 0 {
                anyhow::bail!("--top must be greater than 0");
            }
        }
        Command::Coverage { top, .. } => {
            if let Some(top) = top {
                if *top == 0 {
                    anyhow::bail!("--top must be greater than 0");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn formats_numbers_with_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn formats_byte_sizes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1500), "1.5 kB");
        assert_eq!(format_bytes(250_000), "250 kB");
        assert_eq!(format_bytes(3_400_000), "3.4 MB");
    }

    #[test]
    fn rejects_zero_counts() {
        let args = Args::parse_from(["pagelens", "overview", "page.json", "--top", "0"]);
        assert!(validate_args(&args).is_err());

        let args = Args::parse_from(["pagelens", "--workers", "0", "coverage", "updates.jsonl"]);
        assert!(validate_args(&args).is_err());

        let args = Args::parse_from(["pagelens", "coverage", "updates.jsonl", "--type", "css"]);
        assert!(validate_args(&args).is_ok());
    }
}
