use anyhow::Result;
use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

pub fn run(args: &SchemaArgs) -> Result<()> {
    let schema = crate::models::json_schema();
    let rendered = if args.compact {
        serde_json::to_string(&schema)?
    } else {
        serde_json::to_string_pretty(&schema)?
    };
    println!("{rendered}");
    Ok(())
}
