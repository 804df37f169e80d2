//! The declaration passes converge: a prebuild followed by a full build gives
//! the same contexts and declarations as two full builds.

use ziglens_compiler_semantic::builders::declarations;
use ziglens_compiler_semantic::{DuChain, ParseSession, TopDuContext};

use crate::{document_path, find_decl, virtual_project};

const FORWARD_REFERENCES: &str = r#"const Pair = struct { first: Item, second: Item };
const Item = struct { id: u32 };
const size = count * 2;
const count: u32 = 3;
fn twice(x: u32) u32 {
    return helper(x) * 2;
}
fn helper(x: u32) u32 {
    return x;
}
"#;

fn build_with(name: &str, first_pass_prebuilds: bool) -> TopDuContext {
    let chain = DuChain::new();
    let path = document_path(name);
    let file = chain.register_file(&path);
    let mut session = ParseSession::new(
        path,
        FORWARD_REFERENCES.to_string(),
        file,
        0,
        virtual_project(),
    );
    declarations::build(&mut session, &chain, first_pass_prebuilds);
    declarations::build(&mut session, &chain, false);
    session.finish()
}

#[test]
fn prebuild_then_build_matches_two_builds() {
    let prebuilt = build_with("build_order", true);
    let rebuilt = build_with("build_order", false);

    assert!(prebuilt.same_declarations(&rebuilt));
    assert_eq!(prebuilt.dump(), rebuilt.dump());
    assert_eq!(find_decl(&prebuilt, "size").ty.to_string(), "u32 = 6");
    assert_eq!(find_decl(&rebuilt, "size").ty.to_string(), "u32 = 6");
}
