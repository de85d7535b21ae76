//! End-to-end conversion scenarios
//!
//! Full YAML-to-XML runs through the public compiler surface, checking
//! the cross-references between the benchmark document and the
//! test-definition document.

use rampart::{Compiler, CompilerContext, Error};

fn compiler() -> Compiler {
    Compiler::new("mirantis.com", CompilerContext::default())
}

#[test]
fn package_rule_produces_cross_referenced_documents() {
    let yaml = r#"
benchmark:
  id: ubuntu_baseline
  title: Ubuntu baseline
  platform: 'cpe:/o:canonical:ubuntu_linux:16.04'
  rules:
    - pkg_test:
        type: pkg
        name: aide
"#;
    let conversion = compiler().convert_str(yaml).unwrap();

    let oval = conversion.oval_xml.as_deref().expect("oval document");
    // one package object named aide
    assert!(oval.contains("<oval-def-linux:dpkginfo_object"));
    assert!(oval.contains("id=\"oval:pkg_test:obj:1\""));
    assert!(oval.contains(">aide</oval-def-linux:name>"));
    // one test requiring all objects to exist
    assert!(oval.contains("<oval-def-linux:dpkginfo_test"));
    assert!(oval.contains("check=\"all\""));
    assert!(oval.contains("check_existence=\"all_exist\""));
    // definition metadata carries the humanized platform
    assert!(oval.contains(">Ubuntu 1604</platform>"));

    // the rule's check references the definition in the oval file
    let benchmark = &conversion.benchmark_xml;
    assert!(benchmark.contains("xccdf_com.mirantis_rule_pkg_test"));
    assert!(benchmark.contains(
        "<check-content-ref href=\"ubuntu_baseline-oval.xml\" name=\"oval:pkg_test:def:1\"/>"
    ));
    assert_eq!(conversion.oval_filename, "ubuntu_baseline-oval.xml");
}

#[test]
fn shared_file_from_same_source_registers_once() {
    let yaml = r#"
benchmark:
  id: shared
  rules:
    - first_check:
        type: sce
        check:
          entrypoint: functions.sh
          codeblock: check_one
    - second_check:
        type: sce
        check:
          entrypoint: functions.sh
          codeblock: check_two
"#;
    let conversion = compiler().convert_str(yaml).unwrap();
    assert_eq!(conversion.shared_files.len(), 1);
    assert!(conversion.shared_files.get("functions.sh").is_some());
}

#[test]
fn shared_file_with_conflicting_sources_aborts_without_output() {
    let yaml = r#"
benchmark:
  id: conflict
  shared-files:
    - functions.sh: lib/functions.sh
    - functions.sh: legacy/functions.sh
"#;
    let err = compiler().convert_str(yaml).unwrap_err();
    assert!(matches!(err, Error::Collision { .. }));
}

#[test]
fn unassigned_rule_lands_in_default_profile_selected() {
    let yaml = r#"
benchmark:
  id: defaults
  rules:
    - lonely_rule:
        type: sysctl
        key: kernel.randomize_va_space
        value: 2
"#;
    let conversion = compiler().convert_str(yaml).unwrap();
    let xml = &conversion.benchmark_xml;
    assert!(xml.contains("xccdf_com.mirantis_profile_default"));
    assert!(xml.contains(
        "<select idref=\"xccdf_com.mirantis_rule_lonely_rule\" selected=\"true\"/>"
    ));
}

#[test]
fn script_rule_exports_wrapped_codeblock_value() {
    let yaml = r#"
benchmark:
  id: scripted
  rules:
    - custom_check:
        type: sce
        title: Custom check
        check:
          engine: shell
          codeblock: |
            test -f /etc/motd
"#;
    let conversion = compiler().convert_str(yaml).unwrap();
    let xml = &conversion.benchmark_xml;

    assert!(xml.contains("xccdf_com.mirantis_value_custom_check-codeblock"));
    assert!(xml.contains("export-name=\"CODEBLOCK\""));
    assert!(xml.contains("href=\"entrypoint.sh\""));
    // script rules carry no definition-side content
    assert!(conversion.oval_xml.is_none());
    // the entrypoint travels as a shared file
    let entrypoint = conversion.shared_files.get("entrypoint.sh").unwrap();
    assert!(entrypoint.executable());
}

#[test]
fn listening_rule_binds_external_variable_to_value() {
    let yaml = r#"
benchmark:
  id: listeners
  values:
    - listen_address:
        type: string
        value: 127.0.0.1
  rules:
    - ssh_listen:
        type: listen
        port: 22
        variable: listen_address
"#;
    let conversion = compiler().convert_str(yaml).unwrap();

    let oval = conversion.oval_xml.as_deref().expect("oval document");
    assert!(oval.contains("<variables>"));
    assert!(oval.contains("id=\"oval:listen_address:var:1\""));
    assert!(oval.contains("var_ref=\"oval:listen_address:var:1\""));

    let benchmark = &conversion.benchmark_xml;
    assert!(benchmark.contains(
        "<check-export value-id=\"xccdf_com.mirantis_value_listen_address\" \
         export-name=\"oval:listen_address:var:1\"/>"
    ));
}

#[test]
fn systemd_rule_nests_alternative_criteria() {
    let yaml = r#"
benchmark:
  id: services
  rules:
    - auditd_enabled:
        type: systemd
        name: auditd
"#;
    let conversion = compiler().convert_str(yaml).unwrap();
    let oval = conversion.oval_xml.as_deref().expect("oval document");

    // AND over active-state with nested OR over target/socket wiring
    let and_pos = oval.find("operator=\"AND\"").unwrap();
    let or_pos = oval.find("operator=\"OR\"").unwrap();
    assert!(and_pos < or_pos);
    assert!(oval.contains("test_ref=\"oval:service_auditd_state:tst:1\""));
    assert!(oval.contains("test_ref=\"oval:target_wants_auditd:tst:1\""));
    assert!(oval.contains("test_ref=\"oval:target_wants_auditd_socket:tst:1\""));
}

#[test]
fn two_rules_contribute_to_one_oval_document() {
    let yaml = r#"
benchmark:
  id: merged
  rules:
    - aide_installed:
        type: pkg
        name: aide
    - forwarding_off:
        type: sysctl
        key: net.ipv4.ip_forward
        value: 0
"#;
    let conversion = compiler().convert_str(yaml).unwrap();
    let oval = conversion.oval_xml.as_deref().expect("oval document");

    assert_eq!(oval.matches("<definitions>").count(), 1);
    assert_eq!(oval.matches("<tests>").count(), 1);
    assert!(oval.contains("oval:aide_installed:def:1"));
    assert!(oval.contains("oval:forwarding_off:def:1"));
}

#[test]
fn conversion_writes_documents_and_shared_files_once() {
    let yaml = r#"
benchmark:
  id: written
  rules:
    - check_motd:
        type: sce
        check:
          codeblock: test -f /etc/motd
"#;
    let dir = tempfile::tempdir().unwrap();
    let conversion = compiler().convert_str(yaml).unwrap();
    let path = conversion.write(dir.path()).unwrap();

    assert!(path.ends_with("written/written-xccdf.xml"));
    let xml = std::fs::read_to_string(&path).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(dir.path().join("written/entrypoint.sh").exists());
}

#[test]
fn rule_in_declared_profile_keeps_declared_selection() {
    let yaml = r#"
benchmark:
  id: profiles
  profiles:
    - default:
        title: Default Profile
    - hardened:
        title: Hardened
        selectors:
          - select:
              'rule:forwarding_off':
                selected: true
  rules:
    - forwarding_off:
        type: sysctl
        key: net.ipv4.ip_forward
        value: 0
"#;
    let conversion = compiler().convert_str(yaml).unwrap();
    let xml = &conversion.benchmark_xml;

    // explicit selector in the hardened profile
    assert!(xml.contains(
        "<select idref=\"xccdf_com.mirantis_rule_forwarding_off\" selected=\"true\"/>"
    ));
    // the rule still defaults into the first profile
    let default_profile_pos = xml.find("xccdf_com.mirantis_profile_default").unwrap();
    let hardened_pos = xml.find("xccdf_com.mirantis_profile_hardened").unwrap();
    assert!(default_profile_pos < hardened_pos);
}
