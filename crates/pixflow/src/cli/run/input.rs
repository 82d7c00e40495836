//! Assembling the submission from CLI arguments.

use anyhow::Context;
use pixflow_core::{ProcessRequest, WorkerCounts};
use std::path::Path;

use super::RunArgs;
use crate::cli::overrides::expand;

/// Build the request from `--request`, `--urls-file`, and positional URLs.
///
/// URLs from all three sources are concatenated in that order. Worker flags
/// override the request file, which overrides the defaults.
pub fn build_request(args: &RunArgs) -> anyhow::Result<ProcessRequest> {
    let mut request = match &args.request {
        Some(path) => read_request(&expand(path))?,
        None => ProcessRequest {
            urls: Vec::new(),
            workers: WorkerCounts::default(),
        },
    };

    if let Some(path) = &args.urls_file {
        let path = expand(path);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read URL list {:?}", path))?;
        request.urls.extend(parse_url_list(&text));
    }
    request.urls.extend(args.urls.iter().cloned());

    if let Some(n) = args.download_workers {
        request.workers.download = n;
    }
    if let Some(n) = args.resize_workers {
        request.workers.resize = n;
    }
    if let Some(n) = args.reformat_workers {
        request.workers.reformat = n;
    }

    if request.urls.is_empty() {
        anyhow::bail!(
            "No URLs given.\n\n  Hint: pass URLs as arguments, or use --urls-file / --request."
        );
    }
    Ok(request)
}

fn read_request(path: &Path) -> anyhow::Result<ProcessRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read request file {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid request file {:?}", path))
}

/// One URL per line; blank lines and `#` comments are skipped.
fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_list_skips_comments_and_blanks() {
        let text = "# batch one\nhttps://e.com/a.jpg\n\n  https://e.com/b.png  \n#https://e.com/c.jpg\n";
        assert_eq!(
            parse_url_list(text),
            vec!["https://e.com/a.jpg", "https://e.com/b.png"]
        );
    }

    #[test]
    fn test_positional_urls_with_default_workers() {
        let args = RunArgs {
            urls: vec!["https://e.com/a.jpg".to_string()],
            ..Default::default()
        };
        let request = build_request(&args).unwrap();
        assert_eq!(request.urls, vec!["https://e.com/a.jpg"]);
        assert_eq!(request.workers, WorkerCounts::default());
    }

    #[test]
    fn test_request_file_then_flag_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(
            &path,
            r#"{"urls":["https://e.com/1.jpg"],
                "workers":{"download":2,"resize":3,"reformat":4,"watermark":1}}"#,
        )
        .unwrap();
        let list = dir.path().join("urls.txt");
        std::fs::write(&list, "https://e.com/2.jpg\n").unwrap();

        let args = RunArgs {
            urls: vec!["https://e.com/3.jpg".to_string()],
            request: Some(path),
            urls_file: Some(list),
            resize_workers: Some(7),
            ..Default::default()
        };
        let request = build_request(&args).unwrap();

        assert_eq!(
            request.urls,
            vec!["https://e.com/1.jpg", "https://e.com/2.jpg", "https://e.com/3.jpg"]
        );
        assert_eq!(request.workers.download, 2);
        assert_eq!(request.workers.resize, 7);
        assert_eq!(request.workers.reformat, 4);
        assert_eq!(request.workers.watermark, 1);
    }

    #[test]
    fn test_no_urls_is_an_error() {
        let err = build_request(&RunArgs::default()).unwrap_err();
        assert!(err.to_string().contains("No URLs"));
    }

    #[test]
    fn test_malformed_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"urls\": 3}").unwrap();
        let args = RunArgs {
            request: Some(path),
            ..Default::default()
        };
        let err = build_request(&args).unwrap_err();
        assert!(err.to_string().contains("Invalid request file"));
    }
}
