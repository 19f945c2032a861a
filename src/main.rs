use regauthz::{
    config::Config,
    runtime::{build_state, run_from_env, run_standalone},
};
use std::path::PathBuf;

const USAGE: &str = "\
Usage: regauthz [OPTIONS]

Authorization sidecar for an OCI/Docker V2 registry.

Options:
  -c, --config <path>  Path to YAML config file
      --check          Validate configuration and exit
  -h, --help           Print help
";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliOptions {
    config_path: Option<PathBuf>,
    check_only: bool,
    help: bool,
}

fn parse_cli_args<I>(args: I) -> Result<CliOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => options.help = true,
            "--check" => options.check_only = true,
            "-c" | "--config" => {
                let value = args
                    .next()
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| "missing value for --config".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            _ => match arg.strip_prefix("--config=") {
                Some("") => return Err("missing value for --config".to_string()),
                Some(value) => options.config_path = Some(PathBuf::from(value)),
                None => return Err(format!("unknown argument: {arg}")),
            },
        }
    }
    Ok(options)
}

fn load_config(options: &CliOptions) -> Result<Config, String> {
    match options.config_path.clone() {
        Some(path) => Config::from_env_with_config_file(path),
        None => Config::from_env(),
    }
}

#[tokio::main]
async fn main() {
    let options = match parse_cli_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    if options.help {
        println!("{USAGE}");
        return;
    }

    if options.check_only {
        let outcome = load_config(&options)
            .and_then(|config| build_state(&config).map_err(|err| err.to_string()));
        match outcome {
            Ok(_) => println!("configuration ok"),
            Err(err) => {
                eprintln!("invalid configuration: {err}");
                std::process::exit(2);
            }
        }
        return;
    }

    let run_result = if options.config_path.is_some() {
        match load_config(&options) {
            Ok(config) => run_standalone(config).await,
            Err(err) => {
                eprintln!("invalid --config value: {err}");
                std::process::exit(2);
            }
        }
    } else {
        run_from_env().await
    };

    if let Err(err) = run_result {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}
