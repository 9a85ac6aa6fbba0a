//! JSON summary of a built instrument: its instances with their bindings,
//! positions, groups and jumps, and the component types they use.
use crate::traits::Backend;
use itertools::Itertools;
use mccode_ir as ir;
use mccode_utils::{Error, McResult, OutputFile};
use std::io::Write;

#[derive(Default)]
pub struct JsonBackend;

fn to_value<T: serde::Serialize + ?Sized>(
    value: &T,
) -> McResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|err| {
        Error::write_error(format!("Failed to serialize instrument: {err}"))
    })
}

impl Backend for JsonBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn validate(_ctx: &ir::Context) -> McResult<()> {
        Ok(())
    }

    fn link_externs(
        _ctx: &ir::Context,
        _file: &mut OutputFile,
    ) -> McResult<()> {
        Ok(())
    }

    fn emit(ctx: &ir::Context, file: &mut OutputFile) -> McResult<()> {
        let types = ctx
            .instrument
            .instances
            .iter()
            .map(|inst| inst.def)
            .unique()
            .map(|def| to_value(&ctx.definitions[def]))
            .collect::<McResult<Vec<_>>>()?;
        let mut summary = serde_json::Map::new();
        summary.insert("instrument".into(), to_value(&ctx.instrument)?);
        summary.insert("components".into(), serde_json::Value::Array(types));

        let mut out = file.get_write()?;
        serde_json::to_writer_pretty(&mut out, &summary).map_err(|err| {
            Error::write_error(format!(
                "Failed to write {}: {err}",
                file.as_path_string()
            ))
        })?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}
