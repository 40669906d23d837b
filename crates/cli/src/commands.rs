use anyhow::{bail, Context, Result};
use std::io::Write;
use std::time::Duration;

use kassensturz_core::{Category, TransactionBatch};
use kassensturz_export::{
    BrowserDispatcher, CancelFlag, Dispatcher, FileExporter, HttpDispatcher, RequestBatchExporter,
};
use kassensturz_import::{
    ApiConfig, Credentials, HttpAccountApi, Process, Processor, RemoteAccountProcessor,
    TabularProcessor,
};

use crate::args::{OutputArgs, OutputKind, ProcessArgs, RemoteArgs, SendMode};
use crate::config::Config;

pub fn process(args: &ProcessArgs, config: &Config, out: &mut dyn Write) -> Result<()> {
    let mut processor = match &args.layout {
        Some(name) => {
            let layout = config
                .layout_named(name)
                .with_context(|| format!("Unknown layout '{name}'"))?;
            TabularProcessor::for_layout(layout)
        }
        None => TabularProcessor::new(config.all_layouts()),
    };
    if let Some(account) = args.account.as_ref().or(config.account.as_ref()) {
        processor = processor.with_account(account.clone());
    }
    processor.set_category_mapper(&config.mapper.export());

    let batch = processor
        .process(&args.file, &args.window.window())
        .with_context(|| format!("Failed to import {}", args.file.display()))?;
    export(&batch, &args.output, config, out)
}

pub fn remote(args: &RemoteArgs, config: &Config, out: &mut dyn Write) -> Result<()> {
    let mut api_config = ApiConfig::new(&args.api_url);
    if let Some(secs) = args.timeout {
        api_config = api_config.with_timeout(Duration::from_secs(secs));
    }
    let credentials = Credentials::new(&args.username, &args.password);
    let api = HttpAccountApi::login(api_config, &credentials).context("Login failed")?;

    let mut processor = RemoteAccountProcessor::new(&args.name, api);
    if let Some(size) = args.page_size {
        processor = processor.with_page_size(size);
    }
    processor.set_category_mapper(&config.mapper.export());

    let batch = processor
        .process(&args.account_id, &args.window.window())
        .context("Failed to fetch transactions")?;
    export(&batch, &args.output, config, out)
}

pub fn categories(out: &mut dyn Write) -> Result<()> {
    for category in Category::ALL {
        let subs: Vec<&str> = category.allowed_subcategories().iter().map(|s| s.name()).collect();
        if subs.is_empty() {
            writeln!(out, "{category}")?;
        } else {
            writeln!(out, "{category}: {}", subs.join(", "))?;
        }
    }
    Ok(())
}

fn export(
    batch: &TransactionBatch,
    output: &OutputArgs,
    config: &Config,
    out: &mut dyn Write,
) -> Result<()> {
    if batch.is_empty() {
        tracing::warn!(source = %batch.source, "No transactions in range");
    }
    match output.output {
        OutputKind::Csv => export_csv(batch, output, out),
        OutputKind::Links => export_links(batch, output, config, out),
    }
}

fn export_csv(batch: &TransactionBatch, output: &OutputArgs, out: &mut dyn Write) -> Result<()> {
    let exporter = FileExporter::new();
    if output.dry_run {
        write!(out, "{}", exporter.preview(batch)?)?;
        return Ok(());
    }
    match &output.out {
        Some(path) => {
            let rows = exporter
                .write_file(batch, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            writeln!(out, "Wrote {rows} transactions to {}", path.display())?;
        }
        None => {
            exporter.write_to(batch, out)?;
        }
    }
    Ok(())
}

fn export_links(
    batch: &TransactionBatch,
    output: &OutputArgs,
    config: &Config,
    out: &mut dyn Write,
) -> Result<()> {
    let exporter = RequestBatchExporter::new(&config.base_url)
        .route_only(output.route_only)
        .with_pause(config.pause);

    if output.dry_run {
        for request in exporter.dry_run(batch)? {
            writeln!(out, "{}", request.url)?;
        }
        return Ok(());
    }

    let dispatcher: Box<dyn Dispatcher> = match output.send {
        SendMode::Browser => Box::new(BrowserDispatcher),
        SendMode::Http => Box::new(HttpDispatcher::new(None)?),
    };
    let report = exporter.dispatch(batch, dispatcher.as_ref(), &CancelFlag::new())?;
    writeln!(out, "Sent {} of {} import requests", report.dispatched, report.total)?;
    for (index, err) in &report.failed {
        writeln!(out, "  group {}: {err}", index + 1)?;
    }
    if !report.failed.is_empty() {
        bail!("{} import requests failed", report.failed.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::WindowArgs;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    const STATEMENT: &str = "\
Date,Description,Amount,Currency,Category
2025-02-27,Coop Pronto,-8.20,CHF,Coop
2025-03-02,SBB Mobile,-4.40,CHF,SBB
2025-03-03,Gelateria di Berna,-6.00,CHF,
";

    fn output(kind: OutputKind, dry_run: bool) -> OutputArgs {
        OutputArgs {
            output: kind,
            out: None,
            dry_run,
            send: SendMode::Http,
            route_only: false,
        }
    }

    fn args(dir: &tempfile::TempDir, output: OutputArgs) -> ProcessArgs {
        let file = dir.path().join("statement.csv");
        std::fs::write(&file, STATEMENT).unwrap();
        ProcessArgs {
            file,
            layout: None,
            account: Some("Sanzio".to_string()),
            window: WindowArgs {
                from: NaiveDate::from_ymd_opt(2025, 3, 1),
                to: None,
            },
            output,
        }
    }

    fn run(args: &ProcessArgs) -> String {
        let mut out = Vec::new();
        process(args, &Config::default(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn process_to_stdout_uses_suggested_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let text = run(&args(&dir, output(OutputKind::Csv, false)));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "02/03/2025 00:00,-4.4,Essentials,SBB Mobile,,Sanzio");
        assert_eq!(lines[2], "03/03/2025 00:00,-6,Uncategorized,Gelateria di Berna,,Sanzio");
    }

    #[test]
    fn process_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut out_args = output(OutputKind::Csv, false);
        let target: PathBuf = dir.path().join("out.csv");
        out_args.out = Some(target.clone());
        let text = run(&args(&dir, out_args));
        assert!(text.starts_with("Wrote 2 transactions"));
        assert_eq!(std::fs::read_to_string(target).unwrap().lines().count(), 3);
    }

    #[test]
    fn links_dry_run_prints_urls() {
        let dir = tempfile::tempdir().unwrap();
        let text = run(&args(&dir, output(OutputKind::Links, true)));
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("https://budget-track.web.app/addTransaction?JSON="));
    }

    #[test]
    fn unknown_layout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(&dir, output(OutputKind::Csv, true));
        a.layout = Some("ubs".to_string());
        let err = process(&a, &Config::default(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("Unknown layout 'ubs'"));
    }

    #[test]
    fn categories_lists_taxonomy() {
        let mut out = Vec::new();
        categories(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Income: Salary, Side, TWINT"));
        assert!(text.lines().any(|l| l == "Uncategorized"));
    }
}
