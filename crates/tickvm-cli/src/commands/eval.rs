//! Eval command - run one expression against a two-player scratch world

use anyhow::{anyhow, Result};
use tickvm_config::VmConfig;
use tickvm_runtime::{PowBitOrder, Roster, VM};

#[derive(Debug, Default)]
pub struct EvalArgs {
    pub hex: String,
    pub legacy_pow: bool,
    pub profile: bool,
}

pub fn run(args: EvalArgs, config: &VmConfig) -> Result<()> {
    let code = super::parse_hex(&args.hex)?;

    let mut vm = VM::from_config(config);
    if args.profile {
        vm.enable_profiling();
    }
    if args.legacy_pow {
        vm.set_pow_order(PowBitOrder::Legacy);
    }

    let mut roster = Roster::with_seed(0);
    let p1 = roster.add_player(1, "p1");
    roster.add_player(2, "p2");

    let value = vm
        .eval(&mut roster, &code, p1)
        .map_err(|e| anyhow!("evaluation failed: {}", e))?;
    println!("{}", value);

    if let Some(profiler) = vm.profiler() {
        print!("{}", profiler.report());
    }
    Ok(())
}
