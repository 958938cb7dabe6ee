//! `specforge args` command

use anyhow::{Context, Result};

use crate::cli::ArgsArgs;
use crate::GlobalArgs;
use specforge::ops::{construct_task, format_task, load, parse_setting_assignment, ArgsOptions};
use specforge::util::diagnostic::emit;
use specforge::util::version::Version;

pub fn execute(args: ArgsArgs, global: &GlobalArgs) -> Result<bool> {
    let (config, registry) = load(&global.load)?;

    let settings = args
        .set
        .iter()
        .map(|text| parse_setting_assignment(text))
        .collect::<Result<Vec<_>>>()?;
    let tool_version = args
        .tool_version
        .as_deref()
        .map(|text| {
            text.parse::<Version>()
                .with_context(|| format!("invalid --tool-version `{}`", text))
        })
        .transpose()?;

    let opts = ArgsOptions {
        tool: args.tool,
        domain: args.domain,
        inputs: args.inputs,
        output: args.output,
        settings_file: args.settings,
        settings,
        arch: args.arch,
        tool_version,
        features_file: args.features,
        working_dir: global.load.project_root.clone(),
    };

    let result = construct_task(&registry, &config, &opts)?;
    for diagnostic in &result.diagnostics {
        emit(diagnostic, global.color);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.tasks)?);
    } else {
        for (i, task) in result.tasks.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print!("{}", format_task(task));
        }
    }

    Ok(!result.has_errors())
}
