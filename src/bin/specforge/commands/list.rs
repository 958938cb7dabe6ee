//! `specforge list` command

use anyhow::Result;

use crate::cli::{ListArgs, SpecTypeArg};
use crate::GlobalArgs;
use specforge::core::SpecType;
use specforge::ops::{format_spec_list, list_specs, load, ListOptions};

impl From<SpecTypeArg> for SpecType {
    fn from(arg: SpecTypeArg) -> Self {
        match arg {
            SpecTypeArg::Tool => SpecType::Tool,
            SpecTypeArg::Compiler => SpecType::Compiler,
            SpecTypeArg::Linker => SpecType::Linker,
            SpecTypeArg::BuildSystem => SpecType::BuildSystem,
            SpecTypeArg::FileType => SpecType::FileType,
        }
    }
}

pub fn execute(args: ListArgs, global: &GlobalArgs) -> Result<bool> {
    let (_, registry) = load(&global.load)?;

    let opts = ListOptions {
        domain: args.domain,
        ty: args.ty.map(SpecType::from),
    };
    let specs = list_specs(&registry, &opts);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&specs)?);
    } else if specs.is_empty() {
        println!("no specs found");
    } else {
        print!("{}", format_spec_list(&specs));
    }

    Ok(true)
}
