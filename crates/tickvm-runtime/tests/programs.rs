//! End-to-end behavior of blocks, calls and programs driven by the executor

mod common;

use common::*;
use common::assert_eq;
use rstest::rstest;
use std::sync::Arc;
use tickvm_runtime::bytecode::{Opcode, StoreOp};
use tickvm_runtime::program::{ForInit, ForLoop};
use tickvm_runtime::{
    BehaviorProgram, Block, CallFunction, Controller, Executor, Expression, Function,
    ProgramLibrary, RuntimeError, StringPool, Value, World, VM,
};

fn executor_with(programs: Vec<BehaviorProgram>) -> Executor {
    let mut library = ProgramLibrary::new(StringPool::new(), 1);
    for p in programs {
        library.insert(p);
    }
    let mut executor = Executor::new();
    executor.add_library(1, library);
    executor
}

#[test]
fn persistence_period_three_fires_on_ticks_one_and_four() {
    let (mut roster, p1, _) = duel();
    let program = BehaviorProgram::new(0, Block::new(vec![Block::new(vec![bump(0)])
        .persistent(0, 3)
        .into_controller()]))
    .with_slots(1, 0);
    let mut executor = executor_with(vec![program]);

    let mut seen = Vec::new();
    for _ in 0..6 {
        executor.tick(&mut roster);
        seen.push(ivar(&roster, p1, 0));
    }
    assert_eq!(seen, vec![1, 1, 1, 2, 2, 2]);
}

#[test]
fn reentering_a_state_resets_persistence() {
    let (mut roster, p1, _) = duel();
    // State 0 fires its persistent block and then re-enters itself every
    // other tick through var(1).
    let mut toggle = Expression::int(1);
    toggle.emit(Opcode::Var);
    let program = BehaviorProgram::new(
        0,
        Block::new(vec![
            Block::new(vec![bump(0)]).persistent(0, 100).into_controller(),
            Block::new(vec![set_var(1, 0), change_to(0)])
                .guarded(toggle)
                .into_controller(),
            bump(1),
        ]),
    )
    .with_slots(1, 0);
    let mut executor = executor_with(vec![program]);

    executor.tick(&mut roster);
    assert_eq!(ivar(&roster, p1, 0), 1);
    // var(1) is now 1: the state re-enters and the block fires again.
    executor.tick(&mut roster);
    assert_eq!(ivar(&roster, p1, 0), 2);
    assert_eq!(roster.entity(p1).unwrap().block_memory.persistence, vec![100]);
}

#[test]
fn for_loop_with_break_stops_on_iteration_two() {
    let (mut roster, p1, _) = duel();
    let body = vec![
        record_local(10, 0),
        bump(0),
        Block::new(vec![Controller::Break])
            .guarded(local_is(0, 2))
            .into_controller(),
    ];
    let looped = Block::new(body).for_loop(ForLoop {
        init: ForInit::Assign {
            slot: 0,
            value: Expression::int(0),
        },
        end: Expression::int(5),
        step: Expression::int(1),
    });
    let program = BehaviorProgram::new(0, Block::new(vec![looped.into_controller()]))
        .with_locals(1);
    let mut executor = executor_with(vec![program]);

    let report = executor.tick(&mut roster);
    assert!(report.is_clean());
    let e = roster.entity(p1).unwrap();
    assert_eq!(e.ivar[0], 3);
    assert_eq!(e.ivar[10], 2);
    assert_eq!(e.state.number, 0);
    assert!(e.pending_state.is_none());
}

#[test]
fn for_loop_counts_up_through_the_half_open_range() {
    let (mut roster, p1, _) = duel();
    // var(10 + local(0)) := local(0)
    let mut record = Expression::int(10);
    record.append(&local(0));
    record.emit(Opcode::Add);
    record.append(&local(0));
    record.emit_store(StoreOp::SetVar);

    let looped = Block::new(vec![Controller::Expr(record)]).for_loop(ForLoop {
        init: ForInit::Assign {
            slot: 0,
            value: Expression::int(0),
        },
        end: Expression::int(5),
        step: Expression::int(1),
    });
    let program = BehaviorProgram::new(0, Block::new(vec![looped.into_controller()]))
        .with_locals(1);
    let mut executor = executor_with(vec![program]);

    assert!(executor.tick(&mut roster).is_clean());
    let e = roster.entity(p1).unwrap();
    assert_eq!(e.ivar[10..16], [0, 1, 2, 3, 4, 0]);
}

#[rstest]
#[case::resolved(2)]
#[case::unresolved(9)]
fn redirect_leaves_stack_depth_unchanged(#[case] player: i32) {
    let (mut roster, p1, _) = duel();
    let mut body = Expression::new();
    body.emit(Opcode::Life);
    let mut e = Expression::int(player);
    e.emit_redirect(Opcode::Player, &body);

    let mut vm = VM::new();
    let depth = vm.stack().len();
    let v = vm.eval(&mut roster, e.as_bytes(), p1).unwrap();
    assert_eq!(vm.stack().len(), depth);
    if player == 2 {
        assert_eq!(v, Value::int(1000));
    } else {
        assert_eq!(v, Value::SentinelFalse);
    }
}

#[test]
fn unbalanced_program_aborts_only_its_entity() {
    let (mut roster, p1, p2) = duel();
    let mut leaky = Expression::int(1);
    leaky.append(&Expression::int(2));
    let mut executor = executor_with(vec![BehaviorProgram::new(
        0,
        Block::new(vec![Controller::Expr(leaky)]),
    )]);
    let mut other = ProgramLibrary::new(StringPool::new(), 1);
    other.insert(BehaviorProgram::new(0, Block::new(vec![bump(0)])));
    executor.add_library(2, other);

    let report = executor.tick(&mut roster);
    assert_eq!(report.aborted.len(), 1);
    assert_eq!(report.aborted[0].entity, p1);
    match &report.aborted[0].error {
        RuntimeError::StackImbalance { state, dump } => {
            assert_eq!(*state, 0);
            assert_eq!(dump, &vec![Value::int(1)]);
        }
        other => panic!("expected stack imbalance, got {:?}", other),
    }
    assert_eq!(ivar(&roster, p2, 0), 1);
    // The next tick starts from a clean VM and fails the same way.
    let report = executor.tick(&mut roster);
    assert_eq!(report.aborted.len(), 1);
}

#[test]
fn call_with_wrong_argument_count_is_fatal() {
    let (mut roster, p1, _) = duel();
    let function = Arc::new(Function::new("two_args", 2, 0));
    let call = Controller::Call(CallFunction::new(function, vec![Expression::int(1)], vec![]));
    let mut executor = executor_with(vec![BehaviorProgram::new(0, Block::new(vec![call]))]);

    let report = executor.tick(&mut roster);
    assert_eq!(report.aborted.len(), 1);
    assert!(matches!(
        report.aborted[0].error,
        RuntimeError::ArgumentCountMismatch { expected: 2, found: 1, .. }
    ));
    assert_eq!(report.aborted[0].entity, p1);
    assert!(executor.vm().stack().is_empty());
    assert_eq!(executor.vm().windows().depth(), 0);
}

#[test]
fn function_result_lands_in_program_local() {
    let (mut roster, p1, _) = duel();
    // fn square(x) -> (y) { y = x * x }
    let mut square = local(0);
    square.append(&local(0)).emit(Opcode::Mul);
    let function = Arc::new(
        Function::new("square", 1, 1)
            .with_controllers(vec![Controller::Assign { slot: 1, value: square }]),
    );
    let program = BehaviorProgram::new(
        0,
        Block::new(vec![
            Controller::Call(CallFunction::new(function, vec![Expression::int(12)], vec![0])),
            record_local(3, 0),
        ]),
    )
    .with_locals(1);
    let mut executor = executor_with(vec![program]);
    executor.tick(&mut roster);
    assert_eq!(ivar(&roster, p1, 3), 144);
}

#[test]
fn runaway_while_loop_is_fatal_and_contained() {
    let (mut roster, p1, _) = duel();
    let spin = Block::new(vec![bump(0)]).while_loop();
    let program = BehaviorProgram::new(0, Block::new(vec![spin.into_controller()]));
    let mut executor = executor_with(vec![program]);
    executor.vm_mut().set_max_loop_iterations(100);

    let report = executor.tick(&mut roster);
    assert_eq!(
        report.aborted[0].error,
        RuntimeError::LoopLimitExceeded { limit: 100 }
    );
    assert_eq!(ivar(&roster, p1, 0), 100);
    assert!(executor.vm().stack().is_empty());
}
