//! End-to-end queries against synthetic DEX images.

mod common;

use common::{DexBuilder, Ins};
use dexamine::{dex::DexReader, DexIndex, MethodFilter};
use itertools::Itertools;

const OBJECT: &str = "Ljava/lang/Object;";
const MAIN: &str = "Lcom/demo/Main;";
const HOLDER: &str = "Lcom/demo/Holder;";

/// `classes.dex`: a few methods on `Lcom/demo/Main;` wired together with
/// invocations and field accesses, plus a class whose methods each load
/// one string from a prefix family.
fn primary_dex() -> Vec<u8> {
    let mut b = DexBuilder::new();
    let p_v = b.proto("V", &[]);
    let p_vi = b.proto("V", &["I"]);
    let f_obj = b.field(HOLDER, OBJECT, "obj");
    let f_name = b.field(HOLDER, "Ljava/lang/String;", "name");
    let m_attach = b.method(MAIN, "attach", p_v);
    let m_is_nullable = b.method(MAIN, "isNullableType", p_vi);
    let m_log = b.method(MAIN, "log", p_v);
    let m_dup = b.method(MAIN, "dup", p_v);
    let m_switchy = b.method(MAIN, "switchy", p_v);
    let s1 = b.method("Lcom/demo/Strings;", "s1", p_v);
    let s2 = b.method("Lcom/demo/Strings;", "s2", p_v);
    let s3 = b.method("Lcom/demo/Strings;", "s3", p_v);
    let s4 = b.method("Lcom/demo/Strings;", "s4", p_v);
    b.code(
        m_is_nullable,
        vec![
            Ins::ConstString("isNullableType"),
            Ins::Invoke(m_attach),
            Ins::SGet(f_obj),
            Ins::ReturnVoid,
        ],
    );
    b.code(
        m_attach,
        vec![
            Ins::ConstString("greeting"),
            Ins::IPut(f_name),
            Ins::ReturnVoid,
        ],
    );
    b.code(
        m_log,
        vec![
            Ins::SPut(f_obj),
            Ins::InvokeRange(m_is_nullable),
            Ins::ReturnVoid,
        ],
    );
    b.code(
        m_dup,
        vec![
            Ins::ConstString("dup"),
            Ins::ConstString("dup"),
            Ins::ReturnVoid,
        ],
    );
    // Payloads between two invocations: a scanner that fails to step over
    // them as opaque blocks would decode their interior as instructions.
    b.code(
        m_switchy,
        vec![
            Ins::PackedSwitchPayload(4),
            Ins::SparseSwitchPayload(2),
            Ins::FillArrayDataPayload { width: 4, size: 3 },
            Ins::Invoke(m_log),
            Ins::ReturnVoid,
        ],
    );
    b.code(s1, vec![Ins::ConstString("abc"), Ins::ReturnVoid]);
    b.code(s2, vec![Ins::ConstString("abd"), Ins::ReturnVoid]);
    b.code(s3, vec![Ins::ConstStringJumbo("abdx"), Ins::ReturnVoid]);
    b.code(s4, vec![Ins::ConstString("abe"), Ins::ReturnVoid]);
    b.build()
}

/// `classes2.dex`: references `Lcom/demo/Main;.attach()V` without defining
/// it, and invokes it from its own class.
fn secondary_dex() -> Vec<u8> {
    let mut b = DexBuilder::new();
    let p_v = b.proto("V", &[]);
    let m_attach = b.method(MAIN, "attach", p_v);
    let m_relay = b.method("Lcom/demo/Other;", "relay", p_v);
    b.code(m_relay, vec![Ins::Invoke(m_attach), Ins::ReturnVoid]);
    b.build()
}

fn build_index(images: &[Vec<u8>]) -> DexIndex<'_> {
    let readers = images
        .iter()
        .map(|image| DexReader::new(image).expect("synthetic DEX parses"))
        .collect();
    DexIndex::new(readers)
}

#[test]
fn class_index_round_trip() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let object = index.create_class_index(OBJECT);
    assert_ne!(object, DexIndex::NOT_FOUND);
    assert_eq!(index.decode_class(object).unwrap().name, *OBJECT);
    // Re-creation returns the same global index.
    assert_eq!(index.create_class_index(OBJECT), object);
}

#[test]
fn find_field_by_type() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let object = index.create_class_index(OBJECT);
    let fields = index.find_field(object, &[], true);
    assert_eq!(fields.len(), 1);
    let field = index.decode_field(fields[0]).unwrap();
    assert_eq!(field.field_type.name, *OBJECT);
    assert_eq!(field.name, *"obj");
    assert_eq!(field.declaring_class.name, *HOLDER);
}

#[test]
fn find_method_using_string_exact() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let filter = MethodFilter {
        parameter_count: Some(1),
        shorty: Some("VI".to_owned()),
        ..MethodFilter::default()
    };
    let found = index.find_method_using_string("isNullableType", false, &filter, &[], true);
    assert_eq!(found.len(), 1);
    let method = index.decode_method(found[0]).unwrap();
    assert_eq!(method.name, *"isNullableType");
    assert_eq!(method.declaring_class.name, *MAIN);
    assert_eq!(method.parameters.len(), 1);
    assert_eq!(method.parameters[0].name, *"I");
    assert_eq!(method.return_type.name, *"V");

    // The same method is reachable by name + exact parameter list, and the
    // two routes agree on the global index.
    assert_eq!(
        index.create_method_index(MAIN, "isNullableType", &["I"]),
        found[0]
    );
    // A mismatching parameter descriptor rejects every candidate.
    assert_eq!(
        index.create_method_index(MAIN, "isNullableType", &["J"]),
        DexIndex::NOT_FOUND
    );
    assert_eq!(
        index.create_method_index(MAIN, "isNullableType", &[]),
        DexIndex::NOT_FOUND
    );
}

#[test]
fn find_method_invoking_forward_edges() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let caller = index.create_method_index(MAIN, "isNullableType", &["I"]);
    let callees = index.find_method_invoking(caller, &MethodFilter::default(), &[], true);
    assert_eq!(callees.len(), 1);
    let callee = index.decode_method(callees[0]).unwrap();
    assert_eq!(callee.name, *"attach");
}

#[test]
fn find_method_invoked_across_dexes() {
    let images = vec![primary_dex(), secondary_dex()];
    let index = build_index(&images);
    let attach = index.create_method_index(MAIN, "attach", &[]);
    assert_ne!(attach, DexIndex::NOT_FOUND);
    let callers = index.find_method_invoked(attach, &MethodFilter::default(), &[], false);
    let names: Vec<String> = callers
        .iter()
        .map(|&caller| {
            index
                .decode_method(caller)
                .unwrap()
                .name
                .to_string_lossy()
                .into_owned()
        })
        .sorted()
        .collect();
    assert_eq!(names, ["isNullableType", "relay"]);
}

#[test]
fn prefix_bounds_cover_extensions_only() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let found = index.find_method_using_string("abd", true, &MethodFilter::default(), &[], false);
    let names: Vec<String> = found
        .iter()
        .map(|&method| {
            index
                .decode_method(method)
                .unwrap()
                .name
                .to_string_lossy()
                .into_owned()
        })
        .sorted()
        .collect();
    assert_eq!(names, ["s2", "s3"]);
}

#[test]
fn duplicate_string_loads_emit_duplicates() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let found = index.find_method_using_string("dup", false, &MethodFilter::default(), &[], false);
    assert_eq!(found.len(), 2);
    assert_eq!(found[0], found[1]);
}

#[test]
fn payloads_are_stepped_over() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let switchy = index.create_method_index(MAIN, "switchy", &[]);
    let callees = index.find_method_invoking(switchy, &MethodFilter::default(), &[], false);
    assert_eq!(callees.len(), 1);
    assert_eq!(
        index.decode_method(callees[0]).unwrap().name,
        *"log"
    );
}

#[test]
fn field_access_queries() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let obj = index.create_field_index(HOLDER, "obj");
    let name = index.create_field_index(HOLDER, "name");
    assert_ne!(obj, DexIndex::NOT_FOUND);
    assert_ne!(name, DexIndex::NOT_FOUND);

    let getters = index.find_method_getting_field(obj, &MethodFilter::default(), &[], false);
    assert_eq!(getters.len(), 1);
    assert_eq!(
        index.decode_method(getters[0]).unwrap().name,
        *"isNullableType"
    );

    let setters = index.find_method_setting_field(obj, &MethodFilter::default(), &[], false);
    assert_eq!(setters.len(), 1);
    assert_eq!(index.decode_method(setters[0]).unwrap().name, *"log");

    assert!(index
        .find_method_getting_field(name, &MethodFilter::default(), &[], false)
        .is_empty());
    let name_setters = index.find_method_setting_field(name, &MethodFilter::default(), &[], true);
    assert_eq!(name_setters.len(), 1);
    assert_eq!(index.decode_method(name_setters[0]).unwrap().name, *"attach");
}

#[test]
fn full_cache_is_idempotent_and_queries_deterministic() {
    let images = vec![primary_dex(), secondary_dex()];
    let index = build_index(&images);
    index.create_full_cache();
    let log = index.create_method_index(MAIN, "log", &[]);
    let first = index.find_method_invoking(log, &MethodFilter::default(), &[], false);
    index.create_full_cache();
    let second = index.find_method_invoking(log, &MethodFilter::default(), &[], false);
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(
        index.decode_method(first[0]).unwrap().name,
        *"isNullableType"
    );
}

#[test]
fn dex_priority_orders_and_filters() {
    let images = vec![primary_dex(), secondary_dex()];
    let index = build_index(&images);
    assert_eq!(index.dex_count(), 2);

    // The string only lives in the primary DEX.
    let none = index.find_method_using_string(
        "isNullableType",
        false,
        &MethodFilter::default(),
        &[1],
        false,
    );
    assert!(none.is_empty());

    // Out-of-range priorities are dropped, leaving nothing to visit.
    let none = index.find_method_using_string(
        "isNullableType",
        false,
        &MethodFilter::default(),
        &[9],
        false,
    );
    assert!(none.is_empty());

    // A duplicated priority entry re-visits the DEX and duplicates results.
    let twice =
        index.find_method_using_string("dup", false, &MethodFilter::default(), &[0, 0], false);
    assert_eq!(twice.len(), 4);
}

#[test]
fn signature_filters_constrain_matches() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let main = index.create_class_index(MAIN);
    let holder = index.create_class_index(HOLDER);
    let void_ty = index.create_class_index("V");
    let int_ty = index.create_class_index("I");

    let by_class = |declaring_class| MethodFilter {
        declaring_class,
        ..MethodFilter::default()
    };
    assert_eq!(
        index
            .find_method_using_string("greeting", false, &by_class(Some(main)), &[], false)
            .len(),
        1
    );
    assert!(index
        .find_method_using_string("greeting", false, &by_class(Some(holder)), &[], false)
        .is_empty());

    let returning = |return_type| MethodFilter {
        return_type,
        ..MethodFilter::default()
    };
    assert_eq!(
        index
            .find_method_using_string("greeting", false, &returning(Some(void_ty)), &[], false)
            .len(),
        1
    );
    assert!(index
        .find_method_using_string("greeting", false, &returning(Some(int_ty)), &[], false)
        .is_empty());

    let exact_params = MethodFilter {
        parameter_types: vec![Some(int_ty)],
        ..MethodFilter::default()
    };
    assert_eq!(
        index
            .find_method_using_string("isNullableType", false, &exact_params, &[], false)
            .len(),
        1
    );
    let wildcard_param = MethodFilter {
        parameter_types: vec![None],
        ..MethodFilter::default()
    };
    assert_eq!(
        index
            .find_method_using_string("isNullableType", false, &wildcard_param, &[], false)
            .len(),
        1
    );
    let wrong_param = MethodFilter {
        parameter_types: vec![Some(void_ty)],
        ..MethodFilter::default()
    };
    assert!(index
        .find_method_using_string("isNullableType", false, &wrong_param, &[], false)
        .is_empty());

    let contains = MethodFilter {
        contains_parameter_types: vec![int_ty],
        ..MethodFilter::default()
    };
    assert_eq!(
        index
            .find_method_using_string("isNullableType", false, &contains, &[], false)
            .len(),
        1
    );
}

#[test]
fn bad_inputs_collapse_to_empty_results() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    assert_eq!(index.create_class_index("Lmissing;"), DexIndex::NOT_FOUND);
    assert!(index.decode_class(DexIndex::NOT_FOUND).is_none());
    assert!(index.decode_method(DexIndex::NOT_FOUND).is_none());
    assert!(index.decode_field(DexIndex::NOT_FOUND).is_none());
    assert!(index.find_field(DexIndex::NOT_FOUND, &[], false).is_empty());
    assert!(index
        .find_method_invoking(DexIndex::NOT_FOUND, &MethodFilter::default(), &[], false)
        .is_empty());
    let bad_filter = MethodFilter {
        return_type: Some(12_345),
        ..MethodFilter::default()
    };
    assert!(index
        .find_method_using_string("isNullableType", false, &bad_filter, &[], false)
        .is_empty());
}

#[test]
fn views_render_descriptor_form() {
    let images = vec![primary_dex()];
    let index = build_index(&images);
    let method = index.create_method_index(MAIN, "isNullableType", &["I"]);
    assert_eq!(
        index.decode_method(method).unwrap().to_string(),
        "Lcom/demo/Main;->isNullableType(I)V"
    );
    let field = index.create_field_index(HOLDER, "obj");
    assert_eq!(
        index.decode_field(field).unwrap().to_string(),
        "Lcom/demo/Holder;->obj:Ljava/lang/Object;"
    );
}
