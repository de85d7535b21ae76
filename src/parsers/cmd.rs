//! Command-exec check
//!
//! Wraps a shell command line or python body into a self-contained
//! executable script registered as a shared file, and points a
//! script-engine check at it. Produces no definition-side content.

use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::xccdf::{Check, CheckSystem, XccdfKind};

use super::common::{base_rule, get, scalar_str, str_field};
use super::{ParsedRule, ParserContext};

const SHELL_WRAPPER_HEAD: &str = r#"#!/bin/bash
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
set -o xtrace
"#;

const SHELL_WRAPPER_TAIL: &str = "\nexit_with PASS\n";

const PYTHON_WRAPPER_HEAD: &str = "#!/usr/bin/python\nimport os\nimport sys\nimport traceback\n\n";

const PYTHON_WRAPPER_BODY: &str = r#"
XCCDF_RESULT_PASS = os.environ.get('XCCDF_RESULT_PASS', 0)
XCCDF_RESULT_FAIL = os.environ.get('XCCDF_RESULT_FAIL', 1)

def exit_pass():
    sys.exit(XCCDF_RESULT_PASS)

def exit_fail():
    sys.exit(XCCDF_RESULT_FAIL)

"#;

const PYTHON_WRAPPER_TAIL: &str = r#"
try:
    main()
    exit_pass()
except:
    traceback.print_exc(file=sys.stdout)
    exit_fail()
"#;

fn shell_script(cmd: &str) -> String {
    format!(
        "#!/bin/bash\nsource wrapper-head.sh\n{}\nsource wrapper-tail.sh\n",
        cmd
    )
}

fn python_script(spec: &Mapping) -> String {
    let mut script = String::from(PYTHON_WRAPPER_HEAD);
    if let Some(serde_yaml::Value::Sequence(imports)) = get(spec, "imports") {
        for import in imports.iter().filter_map(scalar_str) {
            script.push_str(&import);
            script.push('\n');
        }
    }
    script.push_str(PYTHON_WRAPPER_BODY);
    if let Some(raw) = str_field(spec, "raw") {
        script.push_str(&raw);
        script.push('\n');
    }
    if let Some(main) = str_field(spec, "main") {
        script.push_str("def main():\n");
        for line in main.lines() {
            if line.trim_end().is_empty() {
                script.push('\n');
            } else {
                script.push_str("    ");
                script.push_str(line);
                script.push('\n');
            }
        }
    }
    script.push_str(PYTHON_WRAPPER_TAIL);
    script
}

pub(super) fn parse(ctx: &mut ParserContext<'_>, id: &str, spec: &Mapping) -> Result<ParsedRule> {
    let context = format!("rule '{}'", id);
    let mut rule = base_rule(ctx.benchmark.generator(), id, spec)?;

    let filename = if let Some(cmd) = str_field(spec, "cmd") {
        ctx.shared_files
            .insert_content("wrapper-head.sh", SHELL_WRAPPER_HEAD)?;
        ctx.shared_files
            .insert_content("wrapper-tail.sh", SHELL_WRAPPER_TAIL)?;
        let filename = format!("{}.sh", id);
        ctx.shared_files
            .insert_content(filename.clone(), shell_script(&cmd))?
            .set_executable();
        filename
    } else if let Some(python) = get(spec, "python").and_then(|v| v.as_mapping()) {
        let filename = format!("{}.py", id);
        ctx.shared_files
            .insert_content(filename.clone(), python_script(python))?
            .set_executable();
        filename
    } else {
        return Err(Error::validation(format!(
            "no script or command line found in {}, expected 'cmd' or 'python'",
            context
        )));
    };

    let mut check = Check::new(CheckSystem::ScriptEngine);
    check.check_import("stdout").check_content_ref(filename, None);

    if let Some(serde_yaml::Value::Sequence(exports)) = get(spec, "export") {
        for item in exports {
            let (local, name) = match item {
                serde_yaml::Value::Mapping(map) => {
                    let Some((key, value)) = map.iter().next() else {
                        continue;
                    };
                    let (Some(local), Some(name)) = (scalar_str(key), scalar_str(value)) else {
                        continue;
                    };
                    (local, name)
                }
                other => {
                    let Some(local) = scalar_str(other) else {
                        continue;
                    };
                    let name = local
                        .chars()
                        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                        .collect::<String>()
                        .to_uppercase();
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
