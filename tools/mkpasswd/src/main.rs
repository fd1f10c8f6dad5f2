use anyhow::{Context, Result};
use clap::Parser;
use ferricd_core::hash::{format_password, HashAlgorithm};

/// Generate `$ALGO$hexdigest` password strings for ferricd operator blocks.
///
/// By default the tool prompts for a password without echoing it. The
/// resulting string goes into the `password` field of an `[[operators]]`
/// entry in the configuration file.
#[derive(Parser, Debug)]
#[command(name = "mkpasswd", version, about = "Generate operator password hashes for ferricd")]
struct Cli {
    /// Digest algorithm: sha256 or sha512
    #[arg(short, long, default_value = "sha256")]
    algorithm: String,

    /// Password to hash (not recommended - use the interactive prompt)
    #[arg(short, long, conflicts_with = "stdin")]
    password: Option<String>,

    /// Read the password from stdin (useful for scripting)
    #[arg(short, long)]
    stdin: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let algorithm = HashAlgorithm::from_tag(&cli.algorithm)
        .with_context(|| format!("unknown algorithm: {}", cli.algorithm))?;

    let password = if let Some(pwd) = cli.password {
        eprintln!("Warning: passwords on the command line end up in shell history.");
        pwd
    } else if cli.stdin {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read password from stdin")?;
        buffer.trim().to_string()
    } else {
        eprintln!("Enter password: ");
        rpassword::read_password().context("failed to read password")?
    };

    if password.is_empty() {
        anyhow::bail!("password cannot be empty");
    }

    println!("{}", format_password(algorithm, &password));
    Ok(())
}
