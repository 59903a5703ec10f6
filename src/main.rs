use clap::Parser;
use log::info;
use std::error::Error;

use lstm_translator::config::TranslatorConfig;
use lstm_translator::text_generator::Translator;
use lstm_translator::ui::routes::run_server;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train an English to Portuguese LSTM translator and serve it", long_about = None)]
struct CliArgs {
    /// JSON config file; every field is optional.
    #[arg(long)]
    config: Option<String>,
    /// CSV of sentence pairs (overrides the config).
    #[arg(long)]
    dataset: Option<String>,
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Translate this sentence, print the result and exit instead of serving the UI.
    #[arg(long)]
    translate: Option<String>,
}

impl CliArgs {
    fn resolve_config(&self) -> lstm_translator::Result<TranslatorConfig> {
        let mut config = match &self.config {
            Some(path) => TranslatorConfig::load(path)?,
            None => TranslatorConfig::default(),
        };
        if let Some(dataset) = &self.dataset {
            config.dataset.path = dataset.clone();
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        config.validate()?;
        Ok(config)
    }
}

#[actix_web::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(CliArgs::parse()).await {
        eprintln!("Application error: {}", e);
        let mut current_err: Option<&(dyn Error + 'static)> = e.source();
        while let Some(source) = current_err {
            eprintln!("Caused by: {}", source);
            current_err = source.source();
        }
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), Box<dyn Error>> {
    let config = args.resolve_config()?;
    let (translator, history) = Translator::from_config(&config)?;
    if let Some(loss) = history.final_loss() {
        info!("Training finished with loss {:.4}", loss);
    }

    match &args.translate {
        Some(sentence) => {
            println!("{}", translator.translate(sentence)?);
            Ok(())
        }
        None => {
            run_server(translator, &config.server).await?;
            Ok(())
        }
    }
}
