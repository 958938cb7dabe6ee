//! `specforge show` command

use anyhow::Result;

use crate::cli::ShowArgs;
use crate::GlobalArgs;
use specforge::ops::{format_spec_details, load, show_spec};

pub fn execute(args: ShowArgs, global: &GlobalArgs) -> Result<bool> {
    let (_, registry) = load(&global.load)?;
    let details = show_spec(&registry, &args.identifier, &args.domain)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        print!("{}", format_spec_details(&details));
    }

    Ok(true)
}
