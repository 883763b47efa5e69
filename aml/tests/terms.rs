// aml/tests/terms.rs
//
// method 本体の名前解決、参照演算子、CreateXxxField、Index を
// 小さなテーブルで 1 つずつ確かめる。

mod common;

use aml::object::PackageElement;
use aml::opcode::*;
use aml::{AmlConfig, AmlContext, AmlError, Object, ObjectType};
use common::*;

fn table() -> Vec<u8> {
    // Device(PCI0) { Name(FOO_, 1); Device(EC0_) { Name(FOO_, 2); Method(MTH_) { Return(^FOO_) } } }
    let pci = device(
        "PCI0",
        &cat(&[
            &name("FOO_", &[ONE_OP]),
            &device(
                "EC0_",
                &cat(&[&name("FOO_", &byte(2)), &method("MTH_", 0, &cat(&[&[RETURN_OP], &path("^FOO_")]))]),
            ),
        ]),
    );

    // Device(DEV0) { Name(TMP_, 1); Method(MTH_) { Name(TMP_, 5); Return(TMP_) } }
    let dev = device(
        "DEV0",
        &cat(&[
            &name("TMP_", &[ONE_OP]),
            &method("MTH_", 0, &cat(&[&name("TMP_", &byte(5)), &[RETURN_OP], &path("TMP_")])),
        ]),
    );

    let index = |source: &str, i: u8| cat(&[&[INDEX_OP], &path(source), &byte(i), &[NULL_NAME]]);

    cat(&[
        &name("VAL_", &byte(0x10)),
        &[ALIAS_OP],
        &path("VAL_"),
        &path("VALA"),
        &name("BUF_", &buffer(&[1, 2, 3, 4, 5, 6, 7, 8])),
        &name("PKG_", &package(&[1, 2, 3])),
        &pci,
        &dev,
        // Store(RefOf(VAL_), Local0); Store(0x21, DerefOf(Local0)); Return(VAL_)
        &method(
            "REFS",
            0,
            &cat(&[
                &[STORE_OP, REF_OF_OP],
                &path("VAL_"),
                &[LOCAL0_OP, STORE_OP],
                &byte(0x21),
                &[DEREF_OF_OP, LOCAL0_OP, RETURN_OP],
                &path("VAL_"),
            ]),
        ),
        // Return(CondRefOf(VAL_, Local0))
        &method("CRF1", 0, &cat(&[&[RETURN_OP, EXT_OP_PREFIX, EXT_COND_REF_OF_OP], &path("VAL_"), &[LOCAL0_OP]])),
        // Return(CondRefOf(NONE, Local0))
        &method("CRF0", 0, &cat(&[&[RETURN_OP, EXT_OP_PREFIX, EXT_COND_REF_OF_OP], &path("NONE"), &[LOCAL0_OP]])),
        // CondRefOf(VAL_, Local0); Return(DerefOf(Local0))
        &method(
            "CRFL",
            0,
            &cat(&[&[EXT_OP_PREFIX, EXT_COND_REF_OF_OP], &path("VAL_"), &[LOCAL0_OP, RETURN_OP, DEREF_OF_OP, LOCAL0_OP]]),
        ),
        // Return(DerefOf(0x05))
        &method("DRFI", 0, &cat(&[&[RETURN_OP, DEREF_OF_OP], &byte(5)])),
        &method("INCO", 0, &[INCREMENT_OP, ONES_OP]),
        &method("DEC1", 0, &[DECREMENT_OP, ONE_OP]),
        &method("RET1", 0, &[RETURN_OP, ONE_OP]),
        // If(LEqual(Arg0, One)) { Return(0x10) } Else { Return(0x20) }
        &method(
            "IFE_",
            1,
            &if_else(&[LEQUAL_OP, ARG0_OP, ONE_OP], &cat(&[&[RETURN_OP], &byte(0x10)]), &cat(&[&[RETURN_OP], &byte(0x20)])),
        ),
        // Store(0x33, VALA); Return(VAL_)
        &method("ALS_", 0, &cat(&[&[STORE_OP], &byte(0x33), &path("VALA"), &[RETURN_OP], &path("VAL_")])),
        // CreateWordField(BUF_, 2, WRD_); Return(WRD_)
        &method(
            "CWRD",
            0,
            &cat(&[&[CREATE_WORD_FIELD_OP], &path("BUF_"), &byte(2), &path("WRD_"), &[RETURN_OP], &path("WRD_")]),
        ),
        // CreateBitField(BUF_, 0, BIT0); Return(BIT0)
        &method(
            "CBIT",
            0,
            &cat(&[&[CREATE_BIT_FIELD_OP], &path("BUF_"), &[ZERO_OP], &path("BIT0"), &[RETURN_OP], &path("BIT0")]),
        ),
        // CreateWordField(BUF_, 2, WRD_); Store(0xBEEF, WRD_); Return(BUF_)
        &method(
            "CSTW",
            0,
            &cat(&[
                &[CREATE_WORD_FIELD_OP],
                &path("BUF_"),
                &byte(2),
                &path("WRD_"),
                &[STORE_OP, WORD_PREFIX, 0xEF, 0xBE],
                &path("WRD_"),
                &[RETURN_OP],
                &path("BUF_"),
            ]),
        ),
        // CreateDWordField(BUF_, 0x2000000000000000, FLD_)
        &method("CBIG", 0, &cat(&[&[CREATE_DWORD_FIELD_OP], &path("BUF_"), &qword(0x2000_0000_0000_0000), &path("FLD_")])),
        // CreateField(BUF_, 0xFFFFFFFFFFFFFFF8, 0x10, FLD_)
        &method(
            "CFLX",
            0,
            &cat(&[
                &[EXT_OP_PREFIX, EXT_CREATE_FIELD_OP],
                &path("BUF_"),
                &qword(0xFFFF_FFFF_FFFF_FFF8),
                &byte(0x10),
                &path("FLD_"),
            ]),
        ),
        // CreateQWordField(BUF_, 1, FLD_)
        &method("CEND", 0, &cat(&[&[CREATE_QWORD_FIELD_OP], &path("BUF_"), &[ONE_OP], &path("FLD_")])),
        // Store(0x99, Index(BUF_, 3)); Return(DerefOf(Index(BUF_, 3)))
        &method(
            "IDXB",
            0,
            &cat(&[&[STORE_OP], &byte(0x99), &index("BUF_", 3), &[RETURN_OP, DEREF_OF_OP], &index("BUF_", 3)]),
        ),
        // Store(0x44, Index(PKG_, 1)); Return(DerefOf(Index(PKG_, 1)))
        &method(
            "IDXP",
            0,
            &cat(&[&[STORE_OP], &byte(0x44), &index("PKG_", 1), &[RETURN_OP, DEREF_OF_OP], &index("PKG_", 1)]),
        ),
        // CopyObject("XY", Index(PKG_, 2)); Return(DerefOf(Index(PKG_, 2)))
        &method(
            "CPYP",
            0,
            &cat(&[&[COPY_OBJECT_OP], &string("XY"), &index("PKG_", 2), &[RETURN_OP, DEREF_OF_OP], &index("PKG_", 2)]),
        ),
        // Name(STR_, "abc"); Store(0x42, Index(STR_, 1)); Return(STR_)
        &method(
            "IDXS",
            0,
            &cat(&[&name("STR_", &string("abc")), &[STORE_OP], &byte(0x42), &index("STR_", 1), &[RETURN_OP], &path("STR_")]),
        ),
    ])
}

fn loaded() -> AmlContext {
    let mut ctx = AmlContext::new(AmlConfig::default());
    ctx.load_table(&table()).unwrap();
    ctx
}

fn call(ctx: &mut AmlContext, method: &str) -> Result<Object, AmlError> {
    ctx.evaluate(&ns(method), Vec::new())
}

fn integer(ctx: &mut AmlContext, method: &str) -> u64 {
    call(ctx, method).unwrap().as_integer().unwrap()
}

#[test]
fn parent_prefix_in_a_method_starts_from_the_method() {
    let mut ctx = loaded();
    assert_eq!(integer(&mut ctx, "\\PCI0.EC0_.MTH_"), 2);
}

#[test]
fn names_created_by_a_method_shadow_and_then_vanish() {
    let mut ctx = loaded();
    assert_eq!(integer(&mut ctx, "\\DEV0.MTH_"), 5);
    // 2 回目も DuplicateName にならない
    assert_eq!(integer(&mut ctx, "\\DEV0.MTH_"), 5);

    assert_eq!(integer(&mut ctx, "\\DEV0.TMP_"), 1);
    assert!(matches!(
        ctx.namespace().lookup_absolute(&ns("\\DEV0.MTH_.TMP_")),
        Err(AmlError::NameNotFound(_))
    ));
}

#[test]
fn ref_of_and_deref_of_reach_the_named_object() {
    let mut ctx = loaded();
    assert_eq!(integer(&mut ctx, "\\REFS"), 0x21);
    assert_eq!(integer(&mut ctx, "\\VAL_"), 0x21);
    assert_eq!(
        call(&mut ctx, "\\DRFI").err(),
        Some(AmlError::NotAReference(ObjectType::Integer))
    );
}

#[test]
fn cond_ref_of_reports_existence_without_failing() {
    let mut ctx = loaded();
    assert_eq!(integer(&mut ctx, "\\CRF1"), u64::MAX);
    assert_eq!(integer(&mut ctx, "\\CRF0"), 0);
    assert_eq!(integer(&mut ctx, "\\CRFL"), 0x10);
}

#[test]
fn constants_cannot_be_incremented_or_decremented() {
    let mut ctx = loaded();
    assert_eq!(call(&mut ctx, "\\INCO").err(), Some(AmlError::StoreToConstant));
    assert_eq!(call(&mut ctx, "\\DEC1").err(), Some(AmlError::StoreToConstant));
    assert_eq!(integer(&mut ctx, "\\RET1"), 1);
    assert_eq!(aml::object::ones().lock().as_integer(), Some(u64::MAX));
}

#[test]
fn if_else_picks_one_branch() {
    let mut ctx = loaded();
    let ife = ns("\\IFE_");
    assert_eq!(ctx.evaluate(&ife, vec![Object::integer(1)]).unwrap().as_integer(), Some(0x10));
    assert_eq!(ctx.evaluate(&ife, vec![Object::integer(2)]).unwrap().as_integer(), Some(0x20));
}

#[test]
fn alias_reads_and_writes_the_source() {
    let mut ctx = loaded();
    assert_eq!(integer(&mut ctx, "\\VALA"), 0x10);
    assert_eq!(integer(&mut ctx, "\\ALS_"), 0x33);
    assert_eq!(integer(&mut ctx, "\\VALA"), 0x33);
}

#[test]
fn create_fields_window_into_the_buffer() {
    let mut ctx = loaded();
    assert_eq!(integer(&mut ctx, "\\CWRD"), 0x0403);
    assert_eq!(integer(&mut ctx, "\\CBIT"), 1);

    let buf = call(&mut ctx, "\\CSTW").unwrap();
    assert_eq!(buf.to_buffer().unwrap(), vec![1, 2, 0xEF, 0xBE, 5, 6, 7, 8]);
}

#[test]
fn create_fields_outside_the_buffer_fail() {
    let mut ctx = loaded();
    assert_eq!(
        call(&mut ctx, "\\CBIG").err(),
        Some(AmlError::IndexOutOfBounds { index: u64::MAX, len: 8 })
    );
    assert_eq!(
        call(&mut ctx, "\\CFLX").err(),
        Some(AmlError::IndexOutOfBounds { index: u64::MAX, len: 8 })
    );
    assert_eq!(call(&mut ctx, "\\CEND").err(), Some(AmlError::IndexOutOfBounds { index: 9, len: 8 }));
}

#[test]
fn index_writes_through_to_buffer_and_package() {
    let mut ctx = loaded();
    assert_eq!(integer(&mut ctx, "\\IDXB"), 0x99);
    assert_eq!(call(&mut ctx, "\\BUF_").unwrap().to_buffer().unwrap()[3], 0x99);

    assert_eq!(integer(&mut ctx, "\\IDXP"), 0x44);
}

#[test]
fn copy_object_into_a_package_element_replaces_it() {
    let mut ctx = loaded();
    let copied = call(&mut ctx, "\\CPYP").unwrap();
    assert_eq!(copied.to_aml_string().unwrap(), "XY");

    let package = match call(&mut ctx, "\\PKG_").unwrap() {
        Object::Package(elements) => elements,
        other => panic!("expected a package, got {:?}", other),
    };
    match &package[2] {
        PackageElement::Value(element) => assert_eq!(element.lock().object_type(), ObjectType::String),
        other => panic!("unexpected element {:?}", other),
    }
}

#[test]
fn index_into_a_string_updates_one_character() {
    let mut ctx = loaded();
    assert_eq!(call(&mut ctx, "\\IDXS").unwrap().to_aml_string().unwrap(), "aBc");
}
