//! Console, clipboard and save-file controllers

use super::args::{nth, text, ArgBlock, Target};
use super::tags::{self, REDIRECT_ID};
use crate::entity::EntityId;
use crate::savestate::{self, SaveData, SaveKind, SaveStateError};
use crate::value::{RuntimeError, Value};
use crate::vm::VM;
use crate::world::World;
use tracing::{info, warn};

/// Expands a print template.
///
/// `%d`/`%i` print the next parameter as an integer, `%f` as a float with six
/// decimals and `%v` in its natural form; `%%` is a literal percent sign.
/// The two-character escapes `\n` and `\t` become newline and tab. A
/// specifier with no parameter left is copied through unchanged.
pub fn format_text(template: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut params = params.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('\\', Some('n')) => {
                chars.next();
                out.push('\n');
            }
            ('\\', Some('t')) => {
                chars.next();
                out.push('\t');
            }
            ('%', Some('%')) => {
                chars.next();
                out.push('%');
            }
            ('%', Some(spec @ ('d' | 'i' | 'f' | 'v'))) => {
                chars.next();
                let Some(v) = params.next() else {
                    out.push('%');
                    out.push(spec);
                    continue;
                };
                let text = match spec {
                    'd' | 'i' => v.to_i32().to_string(),
                    'f' => format!("{:.6}", v.to_f32()),
                    _ => v.to_string(),
                };
                out.push_str(&text);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Evaluates print parameters, keeping floats as floats and reading
/// everything else as an integer.
fn eval_params(
    vm: &mut VM,
    world: &mut dyn World,
    target: &Target,
    exprs: &[&[u8]],
) -> Result<Vec<Value>, RuntimeError> {
    exprs
        .iter()
        .map(|code| {
            let v = vm.eval(world, code, target.origin)?;
            Ok(match v {
                Value::Float(_) => v,
                other => Value::int(other.to_i32()),
            })
        })
        .collect()
}

/// Resolves a template index and expands it.
fn render(
    vm: &mut VM,
    world: &mut dyn World,
    target: &Target,
    tag: u8,
    exprs: &[&[u8]],
    params: &[Value],
) -> Result<String, RuntimeError> {
    let index = target.i32(vm, world, tag, exprs, 0)?;
    let template = vm.strings().resolve(index)?;
    Ok(format_text(template, params))
}

pub(super) fn print_to_console(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::text::*;

    let target = Target::new(entity);
    let mut params = Vec::new();
    args.walk(|tag, exprs| {
        match tag {
            PARAMS => params = eval_params(vm, world, &target, exprs)?,
            TEXT => {
                let line = render(vm, world, &target, tag, exprs, &params)?;
                let player = world.get(entity)?.player_no;
                info!(target: "tickvm::console", player, "{}", line);
            }
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// DisplayToClipboard (`replace`) and AppendToClipboard
pub(super) fn clipboard(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
    replace: bool,
) -> Result<bool, RuntimeError> {
    use tags::text::*;

    let mut target = Target::new(entity);
    let mut params = Vec::new();
    args.walk(|tag, exprs| {
        match tag {
            PARAMS => params = eval_params(vm, world, &target, exprs)?,
            TEXT => {
                let rendered = render(vm, world, &target, tag, exprs, &params)?;
                let e = world.get_mut(target.id)?;
                if replace {
                    e.clipboard.clear();
                }
                e.clipboard
                    .extend(rendered.split('\n').map(str::to_string));
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

pub(super) fn clear_clipboard(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::clear_clipboard::CLEAR => world.get_mut(target.id)?.clipboard.clear(),
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Arguments shared by SaveFile and LoadFile
fn file_args(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<Option<(Target, String, SaveKind)>, RuntimeError> {
    use tags::file::*;

    let mut target = Target::new(entity);
    let mut path = String::new();
    let mut kind = 0;
    let finished = args.walk(|tag, exprs| {
        match tag {
            PATH => path = text(nth(tag, exprs, 0)?).into_owned(),
            SAVE_DATA => kind = target.i32(vm, world, tag, exprs, 0)?,
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if !finished || path.is_empty() {
        return Ok(None);
    }
    let Some(kind) = SaveKind::from_code(kind) else {
        warn!(entity = %target.id, kind, "unknown save data kind");
        return Ok(None);
    };
    Ok(Some((target, path, kind)))
}

fn save_path(vm: &VM, path: &str) -> Option<std::path::PathBuf> {
    match savestate::resolve_path(vm.save_dir(), path) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(path, error = %e, "save path rejected");
            None
        }
    }
}

pub(super) fn save_file(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let Some((target, path, kind)) = file_args(vm, world, entity, args)? else {
        return Ok(false);
    };
    let Some(full) = save_path(vm, &path) else {
        return Ok(false);
    };
    let data = SaveData::capture(world.get(target.id)?, kind);
    savestate::write_file(&full, &data)?;
    tracing::debug!(entity = %target.id, path = %full.display(), ?kind, "save file written");
    Ok(false)
}

/// Loads a save file into the target. A missing file changes nothing.
pub(super) fn load_file(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let Some((target, path, kind)) = file_args(vm, world, entity, args)? else {
        return Ok(false);
    };
    let Some(full) = save_path(vm, &path) else {
        return Ok(false);
    };
    let Some(data) = savestate::read_file(&full)? else {
        return Ok(false);
    };
    if data.kind() != kind {
        return Err(SaveStateError::KindMismatch {
            expected: kind,
            found: data.kind(),
        }
        .into());
    }
    data.restore(world.get_mut(target.id)?);
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Expression, StringPool};
    use crate::controller::Controller;
    use crate::entity::BlockMemory;
    use crate::value::PowBitOrder;
    use crate::world::Roster;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case::plain("hello", &[], "hello")]
    #[case::int("life=%d", &[Value::int(900)], "life=900")]
    #[case::int_from_float("%i", &[Value::Float(2.9)], "2")]
    #[case::float("%f", &[Value::Float(0.5)], "0.500000")]
    #[case::natural("%v %v", &[Value::int(3), Value::Float(1.25)], "3 1.25")]
    #[case::percent("100%%", &[], "100%")]
    #[case::escapes("a\\nb\\tc", &[], "a\nb\tc")]
    #[case::missing_param("%d and %d", &[Value::int(1)], "1 and %d")]
    #[case::unknown_spec("%x", &[Value::int(1)], "%x")]
    #[case::mixed("%d:%f:%v", &[Value::int(-4), Value::Float(1.5), Value::int(7)], "-4:1.500000:7")]
    fn test_format_text(#[case] template: &str, #[case] params: &[Value], #[case] expected: &str) {
        assert_eq!(format_text(template, params), expected);
    }

    fn vm_with(strings: &[&str]) -> (VM, Vec<i32>) {
        let mut pool = StringPool::new();
        let ids = strings.iter().map(|s| pool.intern(s)).collect();
        let mut vm = VM::new();
        vm.bind_library(Arc::new(pool), PowBitOrder::Current);
        (vm, ids)
    }

    #[test]
    fn test_clipboard_display_and_append() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let (mut vm, ids) = vm_with(&["combo %d", "line\\nnext"]);
        let mut memory = BlockMemory::default();

        let display = Controller::DisplayToClipboard(
            ArgBlock::new()
                .with(tags::text::PARAMS, &[Expression::int(12)])
                .with(tags::text::TEXT, &[Expression::int(ids[0])]),
        );
        let append = Controller::AppendToClipboard(
            ArgBlock::new().with(tags::text::TEXT, &[Expression::int(ids[1])]),
        );
        display.run(&mut vm, &mut roster, p1, &mut memory).unwrap();
        append.run(&mut vm, &mut roster, p1, &mut memory).unwrap();
        assert_eq!(
            roster.entity(p1).unwrap().clipboard,
            vec!["combo 12", "line", "next"]
        );

        display.run(&mut vm, &mut roster, p1, &mut memory).unwrap();
        assert_eq!(roster.entity(p1).unwrap().clipboard, vec!["combo 12"]);

        Controller::ClearClipboard(ArgBlock::new().with(tags::clear_clipboard::CLEAR, &[]))
            .run(&mut vm, &mut roster, p1, &mut memory)
            .unwrap();
        assert!(roster.entity(p1).unwrap().clipboard.is_empty());
    }

    #[test]
    fn test_print_with_bad_template_index_is_fatal() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let print = Controller::PrintToConsole(
            ArgBlock::new().with(tags::text::TEXT, &[Expression::int(40)]),
        );
        let result = print.run(&mut VM::new(), &mut roster, p1, &mut BlockMemory::default());
        assert_eq!(result, Err(RuntimeError::StringIndexOutOfRange { index: 40 }));
    }

    fn file(path: &str, kind: i32) -> ArgBlock {
        ArgBlock::new()
            .with(tags::file::PATH, &[Expression::text(path)])
            .with(tags::file::SAVE_DATA, &[Expression::int(kind)])
    }

    #[test]
    fn test_save_then_load_float_vars() {
        let dir = tempfile::tempdir().unwrap();
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let mut vm = VM::new();
        vm.set_save_dir(dir.path());
        let mut memory = BlockMemory::default();

        roster.entity_mut(p1).unwrap().fvar[3] = 2.5;
        Controller::SaveFile(file("p1/fvars.sav", 2))
            .run(&mut vm, &mut roster, p1, &mut memory)
            .unwrap();
        roster.entity_mut(p1).unwrap().fvar[3] = 0.0;
        Controller::LoadFile(file("p1/fvars.sav", 2))
            .run(&mut vm, &mut roster, p1, &mut memory)
            .unwrap();
        assert_eq!(roster.entity(p1).unwrap().fvar[3], 2.5);

        // Wrong kind for an existing file is fatal; a missing file is not.
        assert!(Controller::LoadFile(file("p1/fvars.sav", 1))
            .run(&mut vm, &mut roster, p1, &mut memory)
            .is_err());
        assert!(Controller::LoadFile(file("p1/none.sav", 1))
            .run(&mut vm, &mut roster, p1, &mut memory)
            .is_ok());
    }

    #[test]
    fn test_escaping_save_path_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let mut vm = VM::new();
        vm.set_save_dir(dir.path().join("saves"));

        let result = Controller::SaveFile(file("../escape.sav", 1)).run(
            &mut vm,
            &mut roster,
            p1,
            &mut BlockMemory::default(),
        );
        assert_eq!(result, Ok(false));
        assert!(!dir.path().join("escape.sav").exists());
    }
}
