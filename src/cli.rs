use std::path::PathBuf;

use crate::config::PipelineConfig;

/// Env files, then `CHEL_*` variables, then `--data-dir`.
pub fn load_config() -> PipelineConfig {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let mut config = PipelineConfig::from_env();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if let Some(dir) = parse_data_dir_arg(&args) {
        config.data_dir = dir;
    }
    config
}

pub fn parse_data_dir_arg(args: &[String]) -> Option<PathBuf> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--data-dir=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--data-dir" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::parse_data_dir_arg;
    use std::path::PathBuf;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn data_dir_forms() {
        assert_eq!(
            parse_data_dir_arg(&args(&["--data-dir=/tmp/x"])),
            Some(PathBuf::from("/tmp/x"))
        );
        assert_eq!(
            parse_data_dir_arg(&args(&["-v", "--data-dir", "d"])),
            Some(PathBuf::from("d"))
        );
        assert_eq!(parse_data_dir_arg(&args(&["--data-dir"])), None);
        assert_eq!(parse_data_dir_arg(&args(&["--data-dir= "])), None);
    }
}
