//! Script-engine check
//!
//! Runs an inline script through the Script Check Engine and maps its
//! exit status to a compliance result. The script body is exported as a
//! benchmark value (encoded for the environment-variable transport) and
//! the rule's check references a shared entrypoint file that decodes and
//! executes it.

use serde_yaml::Mapping;

use crate::codeblock;
use crate::error::{Error, Result};
use crate::xccdf::{Check, CheckSystem, XccdfKind};

use super::common::{base_rule, get, scalar_str, str_field};
use super::{ParsedRule, ParserContext};

const SHELL_ENTRYPOINT: &str = r#"#!/bin/bash
set -o errtrace
set -o nounset
set -o pipefail
declare -A XCCDF_RESULT
XCCDF_RESULT[CONTINUE]=100
XCCDF_RESULT[PASS]=${XCCDF_RESULT_PASS:-101}
XCCDF_RESULT[FAIL]=${XCCDF_RESULT_FAIL:-102}
XCCDF_RESULT[ERROR]=${XCCDF_RESULT_ERROR:-103}
XCCDF_RESULT[UNKNOWN]=${XCCDF_RESULT_UNKNOWN:-104}
XCCDF_RESULT[NOT_APPLICABLE]=${XCCDF_RESULT_NOT_APPLICABLE:-105}
XCCDF_RESULT[NOT_CHECKED]=${XCCDF_RESULT_NOT_CHECKED:-106}
XCCDF_RESULT[NOT_SELECTED]=${XCCDF_RESULT_NOT_SELECTED:-107}
XCCDF_RESULT[INFORMATIONAL]=${XCCDF_RESULT_INFORMATIONAL:-108}
XCCDF_RESULT[FIXED]=${XCCDF_RESULT_FIXED:-109}
exit_with(){
  set +o xtrace
  local status=${1:-ERROR}
  local ec=${XCCDF_RESULT[${status}]:-${XCCDF_RESULT[ERROR]}}
  echo "Exiting with status ${status}(${ec})"
  exit ${ec}
}
trap_error(){
  local ec=${1:-0}
  if [[ ${ec} == 100 ]]; then
    return
  elif [[ ${ec} -gt 100 && ${ec} -lt 110 ]]; then
    exit ${ec}
  else
    exit ${XCCDF_RESULT[ERROR]}
  fi
}
trap 'trap_error $?' ERR
if [[ -f "${XCCDF_VALUE_ENTRYPOINT}" ]]; then
  set -o xtrace
  source "${XCCDF_VALUE_ENTRYPOINT}"
fi
exit_with PASS
"#;

const PYTHON_ENTRYPOINT: &str = r#"#!/usr/bin/python
import os
import sys
import traceback

XCCDF_RESULT_PASS = os.environ.get('XCCDF_RESULT_PASS', 0)
XCCDF_RESULT_FAIL = os.environ.get('XCCDF_RESULT_FAIL', 1)

def exit_pass():
    sys.exit(XCCDF_RESULT_PASS)

def exit_fail():
    sys.exit(XCCDF_RESULT_FAIL)

try:
    filename = os.environ.get('XCCDF_VALUE_ENTRYPOINT')
    exec(compile(open(filename, "rb").read(), filename, 'exec'),
         globals(), locals())
    exit_pass()
except:
    traceback.print_exc(file=sys.stdout)
    exit_fail()
"#;

/// Export-name form of a value id: non-alphanumerics collapse to
/// underscores, uppercased
fn export_name(value_id: &str) -> String {
    value_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_uppercase()
}

pub(super) fn parse(ctx: &mut ParserContext<'_>, id: &str, spec: &Mapping) -> Result<ParsedRule> {
    let context = format!("rule '{}'", id);
    let mut rule = base_rule(ctx.benchmark.generator(), id, spec)?;

    let check_spec = get(spec, "check")
        .and_then(|v| v.as_mapping())
        .ok_or_else(|| Error::config("check", context.clone()))?;

    let engine = str_field(check_spec, "engine").unwrap_or_else(|| "shell".to_string());
    let entrypoint = match str_field(check_spec, "entrypoint") {
        Some(entrypoint) => {
            ctx.shared_files
                .insert_source(Some(entrypoint.as_str()), entrypoint.clone())?
                .set_executable();
            entrypoint
        }
        None => match engine.as_str() {
            "shell" => {
                ctx.shared_files
                    .insert_content("entrypoint.sh", SHELL_ENTRYPOINT)?
                    .set_executable();
                "entrypoint.sh".to_string()
            }
            "python" => {
                ctx.shared_files
                    .insert_content("entrypoint.py", PYTHON_ENTRYPOINT)?
                    .set_executable();
                "entrypoint.py".to_string()
            }
            other => {
                return Err(Error::validation(format!(
                    "unsupported script engine '{}' in {}, expected shell or python",
                    other, context
                )))
            }
        },
    };

    let mut check = Check::new(CheckSystem::ScriptEngine);
    check
        .check_import("stdout")
        .check_import("stderr")
        .check_content_ref(entrypoint, None);

    let codeblock_text = str_field(check_spec, "codeblock")
        .ok_or_else(|| Error::config("codeblock", context.clone()))?;
    // python payloads compress before encoding, shell payloads are read
    // back by tooling without a zlib stage
    let encoded = if engine == "python" {
        codeblock::encode_compressed(&codeblock_text)?
    } else {
        codeblock::encode_plain(&codeblock_text)
    };

    let value_local = format!("{}-codeblock", id);
    let value = ctx.benchmark.new_value(&value_local);
    value.set_type("string");
    value.set_value(encoded, None)?;
    value.set_description(codeblock_text);
    let value_id = value.xccdf_id().to_string();
    check.check_export(value_id, "CODEBLOCK");

    // referenced snippets export in declaration order as INCLUDE_NN
    let mut include_index = 0usize;
    for key in ["snippets", "include"] {
        let Some(serde_yaml::Value::Sequence(items)) = get(check_spec, key) else {
            continue;
        };
        for item in items {
            let Some(local) = scalar_str(item) else {
                continue;
            };
            let value = ctx.benchmark.get_value(&local).ok_or_else(|| {
                Error::validation(format!(
                    "value '{}' referenced by {} not found",
                    local, context
                ))
            })?;
            include_index += 1;
            check.check_export(
                value.xccdf_id().to_string(),
                format!("INCLUDE_{:02}", include_index),
            );
        }
    }

    if let Some(serde_yaml::Value::Sequence(items)) = get(check_spec, "values") {
        for item in items {
            let (local, name) = match item {
                serde_yaml::Value::Mapping(map) => {
                    let Some((key, value)) = map.iter().next() else {
                        continue;
                    };
                    let (Some(local), Some(name)) = (scalar_str(key), scalar_str(value)) else {
                        continue;
                    };
                    (local, name.to_uppercase())
                }
                other => {
                    let Some(local) = scalar_str(other) else {
                        continue;
                    };
                    let name = export_name(&local);
                    (local, name)
                }
            };
            let value_id = ctx.benchmark.generator().id(XccdfKind::Value, &local);
            check.check_export(value_id, name);
        }
    }

    rule.add_check(check);
    Ok(ParsedRule::new(rule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SharedFiles;
    use crate::xccdf::{Benchmark, XccdfGenerator};
    use crate::xml::{serialize, XCCDF_NSMAP};
    use std::collections::HashMap;

    fn harness() -> (Benchmark, SharedFiles) {
        (
            Benchmark::new(XccdfGenerator::new("mirantis.com"), "test"),
            SharedFiles::new(),
        )
    }

    fn parse_in(
        benchmark: &mut Benchmark,
        shared_files: &mut SharedFiles,
        id: &str,
        yaml: &str,
    ) -> Result<ParsedRule> {
        let spec: Mapping = serde_yaml::from_str(yaml).unwrap();
        let value_types = HashMap::new();
        let mut ctx = ParserContext {
            benchmark,
            shared_files,
            affected: Vec::new(),
            value_types: &value_types,
        };
        parse(&mut ctx, id, &spec)
    }

    #[test]
    fn test_shell_default_entrypoint_registered() {
        let (mut benchmark, mut shared_files) = harness();
        let result = parse_in(
            &mut benchmark,
            &mut shared_files,
            "bin_true",
            "check:\n  codeblock: |\n    /bin/true\n",
        )
        .unwrap();

        assert!(!result.has_oval_data());
        let entry = shared_files.get("entrypoint.sh").unwrap();
        assert!(entry.executable());
        assert!(entry.content().unwrap().starts_with("#!/bin/bash"));

        // codeblock value registered on the benchmark
        assert!(benchmark.get_value("bin_true-codeblock").is_some());
    }

    #[test]
    fn test_check_exports_codeblock() {
        let (mut benchmark, mut shared_files) = harness();
        let result = parse_in(
            &mut benchmark,
            &mut shared_files,
            "bin_true",
            "check:\n  codeblock: /bin/true\n",
        )
        .unwrap();

        let xml = serialize(&result.rule.to_element().unwrap(), XCCDF_NSMAP);
        assert!(xml.contains("export-name=\"CODEBLOCK\""));
        assert!(xml.contains("value-id=\"xccdf_com.mirantis_value_bin_true-codeblock\""));
        assert!(xml.contains("href=\"entrypoint.sh\""));
    }

    #[test]
    fn test_unknown_engine_fails() {
        let (mut benchmark, mut shared_files) = harness();
        let err = parse_in(
            &mut benchmark,
            &mut shared_files,
            "r",
            "check:\n  engine: lua\n  codeblock: print()\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("lua"));
    }

    #[test]
    fn test_missing_codeblock_fails() {
        let (mut benchmark, mut shared_files) = harness();
        let err = parse_in(
            &mut benchmark,
            &mut shared_files,
            "r",
            "check:\n  engine: shell\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_value_exports_are_sanitized() {
        assert_eq!(export_name("listen-addr.v4"), "LISTEN_ADDR_V4");
    }

    #[test]
    fn test_missing_include_value_fails() {
        let (mut benchmark, mut shared_files) = harness();
        let err = parse_in(
            &mut benchmark,
            &mut shared_files,
            "r",
            "check:\n  codeblock: /bin/true\n  include:\n    - ghost_value\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost_value"));
    }

    #[test]
    fn test_two_rules_share_one_entrypoint() {
        let (mut benchmark, mut shared_files) = harness();
        parse_in(
            &mut benchmark,
            &mut shared_files,
            "first",
            "check:\n  codeblock: /bin/true\n",
        )
        .unwrap();
        parse_in(
            &mut benchmark,
            &mut shared_files,
            "second",
            "check:\n  codeblock: /bin/false\n",
        )
        .unwrap();
        assert_eq!(shared_files.len(), 1);
    }
}
