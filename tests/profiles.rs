use insta::assert_snapshot;
use qat::{ProfileGenerator, ProfileKind, QatError};
use qat_ir::parser::parse_module;
use qat_ir::printer::print_module;
use qat_ir::{IrContext, IrModule};

fn load_sample(ctx: &mut IrContext, name: &str) -> IrModule {
    let path = format!("{}/qir-samples/{name}", env!("CARGO_MANIFEST_DIR"));
    let source = std::fs::read_to_string(&path).unwrap();
    parse_module(ctx, &path, &source).unwrap()
}

#[test]
fn generic_profile_adapts_bell_pair() {
    let mut ctx = IrContext::new();
    let module = load_sample(&mut ctx, "bell.qir");
    let mut profile = ProfileGenerator::with_defaults()
        .new_profile(ProfileKind::Generic)
        .unwrap();
    profile.set_verify_each(true);

    let report = profile.apply(&mut ctx, module).unwrap();
    assert!(report.modified());
    profile.validate(&ctx, module).unwrap();

    assert_snapshot!(print_module(&ctx, module.op()), @r"
    core.module @bell {
      func.func @main() -> core.nil {
        %0 = qir.qubit_ref {index = 0} : qir.qubit
        %1 = qir.qubit_ref {index = 1} : qir.qubit
        func.call %0 {callee = @__quantum__qis__h__body}
        func.call %0, %1 {callee = @__quantum__qis__cnot__body}
        %2 = qir.result_ref {index = 0} : qir.result
        func.call %0, %2 {callee = @__quantum__qis__mz__body}
        %3 = qir.result_ref {index = 1} : qir.result
        func.call %1, %3 {callee = @__quantum__qis__mz__body}
        func.call %2 {callee = @__quantum__rt__result_record_output}
        func.call %3 {callee = @__quantum__rt__result_record_output}
        func.return
      }
    }
    ");
    assert_eq!(profile.qubit_allocation().peak(), 2);
    assert_eq!(profile.result_allocation().count(), 2);
}

#[test]
fn base_profile_rejects_unadapted_module() {
    let mut ctx = IrContext::new();
    let module = load_sample(&mut ctx, "bell.qir");
    let profile = ProfileGenerator::with_defaults()
        .new_profile(ProfileKind::Base)
        .unwrap();

    let Err(QatError::Validation {
        profile: name,
        violations,
    }) = profile.validate(&ctx, module)
    else {
        panic!("expected a validation error");
    };
    assert_eq!(name, "base");
    let callees: Vec<&str> = violations.iter().map(|v| v.reason.as_str()).collect();
    assert_eq!(
        callees,
        [
            "call to `@__quantum__rt__qubit_allocate` is not allowed",
            "call to `@__quantum__rt__qubit_allocate` is not allowed",
            "call to `@__quantum__rt__qubit_release` is not allowed",
            "call to `@__quantum__rt__qubit_release` is not allowed",
        ]
    );
}

#[test]
fn base_profile_adapts_and_validates_register() {
    let mut ctx = IrContext::new();
    let module = load_sample(&mut ctx, "register.qir");
    let mut generator = ProfileGenerator::with_defaults();
    let sample_config = format!("{}/qir-samples/base.toml", env!("CARGO_MANIFEST_DIR"));
    generator.config_mut().load_file(sample_config.as_ref()).unwrap();

    let mut profile = generator.new_profile(ProfileKind::Base).unwrap();
    profile.apply(&mut ctx, module).unwrap();
    profile.validate(&ctx, module).unwrap();

    assert_snapshot!(print_module(&ctx, module.op()), @r"
    core.module @register {
      func.func @main() -> core.nil {
        %0 = qir.qubit_ref {index = 2} : qir.qubit
        func.call %0 {callee = @__quantum__qis__x__body}
        %1 = qir.result_ref {index = 0} : qir.result
        func.call %0, %1 {callee = @__quantum__qis__mz__body}
        %2 = func.call %1 {callee = @__quantum__qis__read_result__body} : core.i1
        func.call %2 {callee = @__quantum__rt__bool_record_output}
        func.return
      }
    }
    ");
    // Static pools never release.
    assert_eq!(profile.qubit_allocation().count(), 3);
}

#[test]
fn base_profile_ignores_disabled_groups() {
    let mut ctx = IrContext::new();
    let module = load_sample(&mut ctx, "bell.qir");
    let mut generator = ProfileGenerator::with_defaults();
    generator
        .config_mut()
        .load_toml("[transformation-rules]\nuse-static-qubit-allocation = false\n")
        .unwrap();

    let mut generic = generator.new_profile(ProfileKind::Generic).unwrap();
    generic.apply(&mut ctx, module).unwrap();
    assert!(print_module(&ctx, module.op()).contains("__quantum__rt__qubit_allocate"));

    let mut ctx = IrContext::new();
    let module = load_sample(&mut ctx, "bell.qir");
    let mut base = generator.new_profile(ProfileKind::Base).unwrap();
    base.apply(&mut ctx, module).unwrap();
    base.validate(&ctx, module).unwrap();
}

#[test]
fn qubit_limit_exhaustion_fails_the_pipeline() {
    let mut ctx = IrContext::new();
    let module = load_sample(&mut ctx, "bell.qir");
    let mut generator = ProfileGenerator::with_defaults();
    generator
        .config_mut()
        .load_toml("[allocation]\nqubit-limit = 1\n")
        .unwrap();

    let mut profile = generator.new_profile(ProfileKind::Generic).unwrap();
    let err = profile.apply(&mut ctx, module).unwrap_err();
    assert!(matches!(err, QatError::Pass(_)));
    assert!(err.to_string().contains("all 1 statically allocated indices are in use"), "{err}");
}
