use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Local;
use scribe_engine::{
    CollectionController, EgressIdentity, Error as EngineError, ResultSink, RunReport,
    TextFileSink, YoutubeSource, load_identity_file, sink_for,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    error::{AppError, Result},
    operator::{self, OperatorConsole},
    output::OutputManager,
};

pub struct CollectOptions {
    pub json_events: bool,
    pub console: bool,
    pub colored: bool,
}

/// Run one collection with the given configuration, driving it from the
/// terminal until it finishes.
pub async fn collect(config: AppConfig, options: CollectOptions) -> Result<()> {
    if config.channels.is_empty() {
        return Err(AppError::InvalidInput(
            "no channels given (use --channels or set `channels` in the config file)".to_owned(),
        ));
    }
    let key_file = config.api_key_file.as_ref().ok_or_else(|| {
        AppError::InvalidInput("no API key file given (use --api-key-file)".to_owned())
    })?;

    let identities = load_identities(config.proxy_file.as_ref())?;
    let run_config = config.run_config(identities);
    run_config.validate()?;

    let source = YoutubeSource::from_key_file(key_file)?
        .with_languages(config.languages.clone())
        .with_timeout(config.request_timeout());
    let sink: Arc<dyn ResultSink> = Arc::from(sink_for(run_config.output_format));

    let (tx, rx) = mpsc::unbounded_channel();
    let controller = CollectionController::new(Arc::new(source), sink).with_events(tx);
    let handle = controller.handle();

    let output = OutputManager::new(
        options.colored,
        options.json_events,
        config.proxy_file.clone(),
    );
    let interrupt = operator::spawn_interrupt(handle.clone());
    let console = options
        .console
        .then(|| OperatorConsole::new(handle.clone(), config.proxy_file.clone()).spawn());
    if options.console {
        info!("Type `stop` to save and exit, `help` for commands");
    }
    let summary = OutputManager::new(options.colored, false, None);
    let printer = tokio::spawn(output.follow(rx));

    let result = tokio::spawn(controller.run(run_config)).await?;
    printer.await?;
    interrupt.abort();
    if let Some(console) = console {
        console.abort();
    }

    match result {
        Ok(report) => {
            print_report(&summary, &report, options.json_events);
            Ok(())
        }
        Err(err) => Err(recover(&summary, err, &std::env::temp_dir()).await),
    }
}

fn load_identities(path: Option<&PathBuf>) -> Result<Vec<EgressIdentity>> {
    match path {
        Some(path) => {
            let identities = load_identity_file(path)?;
            if identities.is_empty() {
                warn!(path = %path.display(), "Proxy file is empty, connecting directly");
            }
            Ok(identities)
        }
        None => {
            info!("No proxy file given, connecting directly");
            Ok(Vec::new())
        }
    }
}

fn print_report(output: &OutputManager, report: &RunReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("Failed to serialize run report: {e}"),
        }
    } else {
        print!("{}", output.summary(report));
    }
}

/// Retry a failed save once, as plain text in `fallback_dir`.
///
/// The run still ends in error; on success the error names the fallback file.
async fn recover(output: &OutputManager, err: EngineError, fallback_dir: &Path) -> AppError {
    let (destination, source, records) = match err {
        EngineError::Persist {
            destination,
            source,
            records,
        } => (destination, source, records),
        other => return other.into(),
    };
    error!(destination = %destination.display(), "Failed to save transcripts: {source}");

    let path = fallback_dir.join(format!(
        "scribe-recovered-{}.txt",
        Local::now().format("%Y%m%d-%H%M%S")
    ));
    match TextFileSink.write(&records, &path).await {
        Ok(count) => {
            println!("{}", output.recovered(&path, count));
            AppError::Recovered {
                destination,
                recovered: path,
                count,
                source,
            }
        }
        Err(e) => {
            error!(path = %path.display(), "Fallback save failed: {e}");
            EngineError::Persist {
                destination,
                source,
                records,
            }
            .into()
        }
    }
}
