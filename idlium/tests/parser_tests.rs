//! End-to-end tests: preprocess and parse whole sources through the
//! public API.

use idlium::{IdlParser, ParseError, ParserConfig, SequenceBound, parse_idl_file, parse_idl_source};

fn parse(src: &str) -> idlium::Model {
    parse_idl_source("test.idl", src, &ParserConfig::default()).unwrap()
}

#[test]
fn sequence_typedefs_keep_bounds_and_base_types() {
    let model = parse(
        "typedef sequence<int32_t,50> T_SmallInt;\n\
         typedef sequence<char> T_Char_v;\n",
    );
    assert_eq!(model.typedefs.len(), 2);

    let bounded = &model.typedefs[0];
    assert_eq!(bounded.name, "T_SmallInt");
    assert_eq!(bounded.base_name, "int32_t");
    assert_eq!(bounded.sequence, Some(SequenceBound::Bounded(50)));

    let unbounded = &model.typedefs[1];
    assert_eq!(unbounded.name, "T_Char_v");
    assert_eq!(unbounded.base_name, "char");
    assert_eq!(unbounded.sequence, Some(SequenceBound::Unbounded));
}

#[test]
fn typedef_chains_resolve_through_struct_fields() {
    let model = parse(
        "typedef char T_Char;\n\
         typedef T_Char T_Char2;\n\
         struct S {\n\
         T_Char2 c;\n\
         };\n",
    );
    assert_eq!(model.structs[0].fields[0].resolved.name, "char");
}

#[test]
fn key_annotations_survive_in_declaration_order() {
    let model = parse(
        "struct Sample {\n\
         @key int a;\n\
         @key int b;\n\
         int c;\n\
         };\n",
    );
    let fields = &model.structs[0].fields;
    let keys: Vec<bool> = fields.iter().map(|f| f.is_key).collect();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(keys, [true, true, false]);
    assert_eq!(names, ["a", "b", "c"]);
}

#[test]
fn qualified_types_carry_their_origin_namespace() {
    let model = parse(
        "struct foo_t { int32_t v; };\n\
         struct S {\n\
         ::Mod1::foo_t a;\n\
         };\n",
    );
    let field = &model.structs[1].fields[0];
    assert_eq!(field.origin_namespace, "Mod1");
    assert_eq!(field.resolved.name, "foo_t");
}

#[test]
fn conditional_compilation_gates_whole_declarations() {
    let src = "#ifdef FOO\n\
               struct Hidden { int a; };\n\
               #endif\n\
               struct Always { int b; };\n";

    let without = parse_idl_source("c.idl", src, &ParserConfig::default()).unwrap();
    assert_eq!(without.structs.len(), 1);

    let config = ParserConfig::new().with_define("FOO", "1");
    let with = parse_idl_source("c.idl", src, &config).unwrap();
    assert_eq!(with.structs.len(), 2);
    assert_eq!(with.structs[0].name, "Hidden");
}

#[test]
fn nested_modules_compose_namespaces() {
    let model = parse(
        "module outer {\n\
         module inner {\n\
         struct Deep { int a; };\n\
         };\n\
         struct Shallow { int b; };\n\
         };\n",
    );
    assert_eq!(model.structs[0].namespace, "outer::inner");
    assert_eq!(model.structs[1].namespace, "outer");
}

#[test]
fn unterminated_bodies_are_fatal_not_truncated() {
    let failure =
        parse_idl_source("u.idl", "struct S {\nint a;\n", &ParserConfig::default()).unwrap_err();
    assert!(matches!(
        failure.error,
        ParseError::UnexpectedEndOfInput { .. }
    ));

    let failure =
        parse_idl_source("u.idl", "module m {\n", &ParserConfig::default()).unwrap_err();
    assert!(matches!(
        failure.error,
        ParseError::UnexpectedEndOfInput { .. }
    ));
}

#[test]
fn includes_resolve_relative_to_the_including_file() {
    let root = std::env::temp_dir().join(format!("idlium-test-{}", std::process::id()));
    let nested = root.join("types");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(
        nested.join("common.idl"),
        "typedef sequence<octet> Payload;\n",
    )
    .unwrap();
    let main_path = root.join("main.idl");
    std::fs::write(
        &main_path,
        "#include \"types/common.idl\"\nstruct Msg {\nPayload data;\n};\n",
    )
    .unwrap();

    let model =
        parse_idl_file(&main_path.to_string_lossy(), &ParserConfig::default()).unwrap();
    assert_eq!(model.typedefs.len(), 1);
    assert_eq!(model.structs[0].fields[0].resolved.name, "octet");
    assert_eq!(
        model.structs[0].fields[0].resolved.sequence,
        Some(SequenceBound::Unbounded)
    );

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn comments_never_reach_the_parser() {
    let model = parse(
        "// leading comment\n\
         struct S { /* inline */ int a; };\n",
    );
    assert_eq!(model.structs[0].fields.len(), 1);
    assert_eq!(model.structs[0].fields[0].name, "a");
}

#[test]
fn diagnostics_do_not_stop_the_parse() {
    let mut engine = IdlParser::new();
    engine
        .parse_source(
            "d.idl",
            "bogus_token;\ntypedef mystery_t bad_t;\nstruct Good { int a; };\n",
        )
        .unwrap();
    let model = engine.model();
    assert_eq!(model.structs.len(), 1);
    assert!(model.typedefs.is_empty());
    assert!(engine.diagnostics().count() >= 2);
}
