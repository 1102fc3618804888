use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_value;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(long, help = "Subject (stable user identity)")]
    pub sub: String,

    #[arg(long, value_delimiter = ',', help = "Comma-separated roles")]
    pub roles: Vec<String>,

    #[arg(long, help = "Lifetime in hours (defaults to configured expiry)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let hours = args.hours.unwrap_or(security.jwt_expiry_hours);
    let claims = Claims::new(args.sub, args.roles, hours);
    let token = generate_jwt(&claims, &security.jwt_secret)?;

    match output_format {
        OutputFormat::Text => println!("{}", token),
        OutputFormat::Json => output_value(
            &output_format,
            &json!({ "token": token, "sub": claims.sub, "roles": claims.roles, "exp": claims.exp }),
        )?,
    }
    Ok(())
}
