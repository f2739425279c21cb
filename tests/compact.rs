//! Compact code-item handling: packed instruction counts and the
//! pre-header extension.

mod common;

use common::{DexBuilder, Ins};
use dexamine::{dex::DexReader, DexIndex, MethodFilter};

#[test]
fn compact_code_items_are_scanned() {
    let mut b = DexBuilder::compact();
    let p_v = b.proto("V", &[]);
    let m = b.method("Lcom/demo/Tiny;", "peek", p_v);
    b.code(m, vec![Ins::ConstString("needle"), Ins::ReturnVoid]);
    let image = b.build();

    let reader = DexReader::new(&image).unwrap();
    assert!(reader.is_compact());
    let index = DexIndex::new(vec![reader]);
    let found = index.find_method_using_string("needle", false, &MethodFilter::default(), &[], true);
    assert_eq!(found.len(), 1);
    assert_eq!(index.decode_method(found[0]).unwrap().name, *"peek");
}

#[test]
fn pre_header_extends_the_instruction_count() {
    // 2100 one-unit fillers push the body past the 11 bits available in
    // `insns_count_and_flags`, forcing the count into the pre-header. A
    // decoder that ignores the pre-header sees a zero-length body and
    // never reaches the trailing const-string.
    let mut b = DexBuilder::compact();
    let p_v = b.proto("V", &[]);
    let m = b.method("Lcom/demo/Huge;", "bulk", p_v);
    let mut insns = vec![Ins::Const4(1); 2100];
    insns.push(Ins::ConstString("deep"));
    insns.push(Ins::ReturnVoid);
    b.code(m, insns);
    let image = b.build();

    let index = DexIndex::new(vec![DexReader::new(&image).unwrap()]);
    let found = index.find_method_using_string("deep", false, &MethodFilter::default(), &[], false);
    assert_eq!(found.len(), 1);
    assert_eq!(index.decode_method(found[0]).unwrap().name, *"bulk");
}

#[test]
fn standard_and_compact_mix_in_one_index() {
    let mut standard = DexBuilder::new();
    let p_v = standard.proto("V", &[]);
    let m = standard.method("Lcom/demo/A;", "left", p_v);
    standard.code(m, vec![Ins::ConstString("shared"), Ins::ReturnVoid]);
    let standard = standard.build();

    let mut compact = DexBuilder::compact();
    let p_v = compact.proto("V", &[]);
    let m = compact.method("Lcom/demo/B;", "right", p_v);
    compact.code(m, vec![Ins::ConstString("shared"), Ins::ReturnVoid]);
    let compact = compact.build();

    let index = DexIndex::new(vec![
        DexReader::new(&standard).unwrap(),
        DexReader::new(&compact).unwrap(),
    ]);
    let found = index.find_method_using_string("shared", false, &MethodFilter::default(), &[], false);
    assert_eq!(found.len(), 2);
    let names: Vec<_> = found
        .iter()
        .map(|&m| index.decode_method(m).unwrap().name)
        .collect();
    assert_eq!(names[0], *"left");
    assert_eq!(names[1], *"right");
}
