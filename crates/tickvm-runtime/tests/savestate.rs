//! Save/load controllers against real files

mod common;

use common::*;
use common::assert_eq;
use tickvm_runtime::controller::tags;
use tickvm_runtime::savestate::{self, SaveData};
use tickvm_runtime::{
    ArgBlock, BlockMemory, Controller, EntityId, Expression, Roster, RuntimeError, World, VM,
};

fn file_controller(load: bool, path: &str, kind: i32) -> Controller {
    let args = ArgBlock::new()
        .with(tags::file::PATH, &[Expression::text(path)])
        .with(tags::file::SAVE_DATA, &[Expression::int(kind)]);
    if load {
        Controller::LoadFile(args)
    } else {
        Controller::SaveFile(args)
    }
}

fn run(
    vm: &mut VM,
    c: &Controller,
    roster: &mut Roster,
    e: EntityId,
) -> Result<bool, RuntimeError> {
    c.run(vm, roster, e, &mut BlockMemory::default())
}

#[test]
fn int_vars_survive_a_save_load_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let (mut roster, p1, _) = duel();
    let mut vm = VM::new();
    vm.set_save_dir(dir.path());

    for i in 0..60 {
        roster.entity_mut(p1).unwrap().ivar[i] = (i as i32) * 3 - 20;
    }
    let before = roster.entity(p1).unwrap().ivar.clone();
    run(&mut vm, &file_controller(false, "slot1/vars.sav", 1), &mut roster, p1).unwrap();

    roster.entity_mut(p1).unwrap().ivar.iter_mut().for_each(|v| *v = 0);
    run(&mut vm, &file_controller(true, "slot1/vars.sav", 1), &mut roster, p1).unwrap();
    assert_eq!(roster.entity(p1).unwrap().ivar, before);

    let on_disk = savestate::read_file(&dir.path().join("slot1/vars.sav"))
        .unwrap()
        .unwrap();
    assert_eq!(on_disk, SaveData::IntVars(before));
}

#[test]
fn loading_a_missing_file_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (mut roster, p1, _) = duel();
    let mut vm = VM::new();
    vm.set_save_dir(dir.path());
    roster.entity_mut(p1).unwrap().fvar[0] = 1.5;

    let changed = run(&mut vm, &file_controller(true, "nothing.sav", 2), &mut roster, p1).unwrap();
    assert!(!changed);
    assert_eq!(roster.entity(p1).unwrap().fvar[0], 1.5);
}

#[test]
fn loading_the_wrong_kind_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (mut roster, p1, _) = duel();
    let mut vm = VM::new();
    vm.set_save_dir(dir.path());

    run(&mut vm, &file_controller(false, "map.sav", 0), &mut roster, p1).unwrap();
    let err = run(&mut vm, &file_controller(true, "map.sav", 1), &mut roster, p1).unwrap_err();
    assert!(matches!(err, RuntimeError::SaveState(_)));
}

#[test]
fn escaping_paths_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let saves = dir.path().join("saves");
    let (mut roster, p1, _) = duel();
    let mut vm = VM::new();
    vm.set_save_dir(&saves);

    run(&mut vm, &file_controller(false, "../escape.sav", 1), &mut roster, p1).unwrap();
    assert!(!dir.path().join("escape.sav").exists());
}
