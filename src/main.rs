use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use autha_ldap::LdapAuthentication;
use autha_ldap::telemetry::setup_logging;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON or YAML configuration file.
    #[arg(long, short, default_value = "config.json")]
    config: PathBuf,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Check credentials; the password is read from stdin.
    Login { username: String },
    /// Show how a user would be displayed.
    User { username: String },
    /// List application roles of a user.
    Roles { username: String },
    /// Print the first value of an attribute.
    Attr { username: String, attribute: String },
}

fn main() -> ExitCode {
    if let Err(err) = setup_logging() {
        eprintln!("cannot initialize logging: {err}");
    }

    let args = Args::parse();
    let plugin = match LdapAuthentication::init_from_file(&args.config) {
        Ok(plugin) => plugin,
        Err(err) => {
            tracing::error!(path = %args.config.display(), %err, "invalid configuration");
            return ExitCode::FAILURE;
        },
    };

    match args.cmd {
        Commands::Login { username } => {
            let mut password = String::new();
            if let Err(err) = std::io::stdin().lock().read_line(&mut password) {
                tracing::error!(%err, "cannot read password from stdin");
                return ExitCode::FAILURE;
            }

            let password = password.trim_end_matches(['\r', '\n']);
            match plugin.log_in(&username, password) {
                Ok(user) => println!("{} ({})", user.username, user.real_name()),
                Err(err) => {
                    println!("{err}");
                    return ExitCode::FAILURE;
                },
            }
        },
        Commands::User { username } => {
            let user = plugin.get_user(&username);
            println!("{} ({})", user.username, user.real_name());
        },
        Commands::Roles { username } => {
            for role in plugin.get_roles(&username) {
                println!("{role}");
            }
        },
        Commands::Attr {
            username,
            attribute,
        } => println!("{}", plugin.get_attr(&username, &attribute)),
    }

    ExitCode::SUCCESS
}
