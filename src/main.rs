use anyhow::Result;
use clap::Parser;
use console::style;
use log::warn;
use std::process::ExitCode;
use video_stylizer::cli::Cli;
use video_stylizer::component::VideoStylizer;
use video_stylizer::component::video_stylizer::{JobSummary, TerminalProgress};
use video_stylizer::config::JobConfig;
use video_stylizer::error::JobError;
use video_stylizer::init;
use video_stylizer::signal::setup_shutdown_signal;
use video_stylizer::tools::{FfmpegTools, PrimitiveStylizer};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init::init(cli.debug);

    match run(cli) {
        Ok(summary) => {
            let name = summary
                .job
                .output
                .file_name()
                .unwrap_or(summary.job.output.as_os_str())
                .to_string_lossy()
                .into_owned();
            println!("{}", style(format!("完成！已儲存至 {name}")).green().bold());
            ExitCode::SUCCESS
        }
        Err(e) => {
            warn!("程式錯誤: {e:#}");
            eprintln!("{} {e:#}", style("錯誤:").red().bold());
            let code = e.downcast_ref::<JobError>().map_or(1, JobError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<JobSummary> {
    let config = JobConfig::from_cli(cli).map_err(JobError::from)?;
    if config.debug {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    let shutdown_signal = setup_shutdown_signal()?;
    let media = FfmpegTools::new(config.tools.clone());
    let stylizer = PrimitiveStylizer::new(config.tools.primitive.clone());
    let progress = TerminalProgress::new();

    let result = VideoStylizer::new(&config, &media, &stylizer, &progress, shutdown_signal).run();
    progress.finish();

    Ok(result?)
}
