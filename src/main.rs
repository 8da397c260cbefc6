use clap::{
    crate_authors, crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches,
    Command,
};
use colored::Colorize;
use splat::{config::Config, source::TemplateSource, InitOptions};
use std::path::PathBuf;

// The CLI layer should only parse inputs and forward them to library code.
fn main() -> miette::Result<()> {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Path to a toml file with default settings")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("init")
                .about("Initialize a new project from a template")
                .visible_aliases(["initialize", "initialise", "create", "new"])
                .arg(
                    Arg::new("package")
                        .help("The fully qualified package name")
                        .required(true),
                )
                .arg(
                    Arg::new("github")
                        .short('g')
                        .long("github")
                        .help("Pull template from a Github repository"),
                )
                .arg(
                    Arg::new("tag")
                        .short('t')
                        .long("tag")
                        .help("Use this release tag instead of latest when pulling from Github"),
                )
                .arg(
                    Arg::new("local")
                        .short('l')
                        .long("local")
                        .help("Path to a local template")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("url")
                        .short('u')
                        .long("url")
                        .help("Base path for url routes"),
                )
                .arg(
                    Arg::new("out")
                        .short('o')
                        .long("out")
                        .help("Path to write output")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .get_matches();

    init_logger(matches.get_flag("verbose"));

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match matches.subcommand() {
        Some(("init", args)) => handle_init(args, &config),
        _ => unreachable!(),
    }
}

fn init_logger(is_verbose: bool) {
    let default_level = if is_verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    log::debug!("executing in verbose mode");
}

fn handle_init(args: &ArgMatches, config: &Config) -> miette::Result<()> {
    let package = args
        .get_one::<String>("package")
        .expect("package required");

    let mut options = InitOptions::new(package, config);

    if let Some(local) = args.get_one::<PathBuf>("local") {
        options.source = TemplateSource::Local(local.clone());
    } else {
        options.source = TemplateSource::GitHub {
            repository: args
                .get_one::<String>("github")
                .cloned()
                .unwrap_or_else(|| config.repository.clone()),
            tag: args.get_one::<String>("tag").cloned(),
        };
    }
    if let Some(url) = args.get_one::<String>("url") {
        options.url_base = url.clone();
    }
    options.out_dir = args.get_one::<PathBuf>("out").cloned();

    let project_path = splat::initialize_project(&options)?;

    println!(
        "{}\n{}",
        "Your application is ready at".green(),
        project_path.display()
    );

    Ok(())
}
