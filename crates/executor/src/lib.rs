//! Interpreting backend for talc render programs.
//!
//! [`InterpreterBackend`] implements [`talc_template_core::CodeBackend`]
//! by walking the operation tree at render time. `host:` expressions are
//! parsed once when the backend accepts a program and evaluated by
//! [`HostRuntime`] against the function libraries named as dependencies.
//!
//! ## Usage
//!
//! ```ignore
//! use talc_executor::InterpreterBackend;
//! use talc_template_core::CodeBackend;
//!
//! let procedure = InterpreterBackend.compile(&compiled_program)?;
//! procedure.render(&mut out, &globals, &DefaultFormatter)?;
//! ```

pub mod backend;
pub mod executor;
mod executor_handlers;
pub mod host;

pub use backend::{InterpretedProgram, InterpreterBackend};
pub use executor::ProgramExecutor;
pub use host::{FunctionRegistry, HostError, HostRuntime, LIBRARIES};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet, HashMap};
    use std::sync::Arc;
    use talc_compiler::Compiler;
    use talc_template_core::{
        CodeBackend, CompiledProgram, GENERATOR_VERSION, KeyInputs, RenderError,
        RenderErrorKind, TemplateKey, TemplateMode,
    };
    use talc_tales::Value;
    use talc_traits::InMemoryResourceProvider;

    type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    struct Fixture<'a> {
        source: &'a str,
        imports: Vec<(&'a str, &'a str)>,
        dependencies: Vec<&'a str>,
        globals: serde_json::Value,
    }

    impl<'a> Fixture<'a> {
        fn new(source: &'a str) -> Self {
            Self {
                source,
                imports: Vec::new(),
                dependencies: Vec::new(),
                globals: json!({}),
            }
        }

        fn import(mut self, path: &'a str, text: &'a str) -> Self {
            self.imports.push((path, text));
            self
        }

        fn dependency(mut self, name: &'a str) -> Self {
            self.dependencies.push(name);
            self
        }

        fn globals(mut self, globals: serde_json::Value) -> Self {
            self.globals = globals;
            self
        }

        fn try_render(&self) -> TestResult<Result<String, RenderError>> {
            init_logger();
            let provider = InMemoryResourceProvider::from_sources(self.imports.iter().copied());
            let program = Compiler::new(Arc::new(provider)).compile(self.source, Some("page.pt"))?;
            let dependencies: BTreeSet<String> =
                self.dependencies.iter().map(|d| d.to_string()).collect();
            let global_types = BTreeMap::new();
            let key = TemplateKey::derive(&KeyInputs {
                template: self.source,
                mode: TemplateMode::Markup,
                filename: Some("page.pt"),
                imports: &[],
                global_types: &global_types,
                dependencies: &dependencies,
            });
            let procedure = InterpreterBackend.compile(&CompiledProgram {
                key,
                program,
                generator_version: GENERATOR_VERSION.to_string(),
                global_types,
                dependencies,
            })?;
            let globals: HashMap<String, Value> = match Value::from(self.globals.clone()) {
                Value::Map(map) => map.into_iter().collect(),
                _ => HashMap::new(),
            };
            let mut out = String::new();
            Ok(procedure
                .render(&mut out, &globals, &talc_template_core::DefaultFormatter)
                .map(|()| out))
        }

        fn render(&self) -> TestResult<String> {
            Ok(self.try_render()??)
        }
    }

    #[test]
    fn test_identity_without_directives() -> TestResult {
        let source = "<!DOCTYPE html>\n<html link=\"\">Hello &amp; <b class='x'>bye</b><br/></html>";
        assert_eq!(Fixture::new(source).render()?, source);
        Ok(())
    }

    #[test]
    fn test_condition_null_and_default() -> TestResult {
        assert_eq!(
            Fixture::new(r#"<html tal:condition="null">Hello</html>"#).render()?,
            ""
        );
        assert_eq!(
            Fixture::new(r#"<html tal:condition="default">Hello</html>"#).render()?,
            "<html>Hello</html>"
        );
        Ok(())
    }

    #[test]
    fn test_attribute_rewrite() -> TestResult {
        let out = Fixture::new(
            r#"<html old="..." class="test" href="owlfish.com" tal:attributes="href default;class null;new test">x</html>"#,
        )
        .globals(json!({"test": "Hello <World>"}))
        .render()?;
        assert_eq!(
            out,
            r#"<html old="..." href="owlfish.com" new="Hello &lt;World&gt;">x</html>"#
        );
        Ok(())
    }

    #[test]
    fn test_boolean_attributes() -> TestResult {
        let out = Fixture::new(
            r#"<input type="checkbox" checked="checked" tal:attributes="checked on; disabled off"/>"#,
        )
        .globals(json!({"on": false, "off": false}))
        .render()?;
        assert_eq!(out, r#"<input type="checkbox"/>"#);
        let out = Fixture::new(r#"<input tal:attributes="disabled flag"/>"#)
            .globals(json!({"flag": true}))
            .render()?;
        assert_eq!(out, r#"<input disabled="disabled"/>"#);
        Ok(())
    }

    #[test]
    fn test_content_escaping_and_structure() -> TestResult {
        let fixture = Fixture::new(
            r#"<p tal:content="markup">old</p><div tal:replace="structure markup"/><i tal:content="nothing">gone</i><b tal:content="default">kept</b>"#,
        )
        .globals(json!({"markup": "<em>&</em>"}));
        assert_eq!(
            fixture.render()?,
            "<p>&lt;em&gt;&amp;&lt;/em&gt;</p><em>&</em><i></i><b>kept</b>"
        );
        Ok(())
    }

    #[test]
    fn test_repeat_binds_loop_variables() -> TestResult {
        let out = Fixture::new(
            r#"<ul><li tal:repeat="item items" tal:content="string:${repeat/item/number}/${repeat/item/length} $item ${repeat/item/parity}"/></ul>"#,
        )
        .globals(json!({"items": ["a", "b"]}))
        .render()?;
        assert_eq!(out, "<ul><li>1/2 a even</li><li>2/2 b odd</li></ul>");
        Ok(())
    }

    #[test]
    fn test_nested_repeat_sees_outer_loop() -> TestResult {
        let out = Fixture::new(
            r#"<tal:block tal:repeat="row rows"><tal:block tal:repeat="cell row" tal:replace="string:${repeat/row/index}${repeat/cell/index};"/></tal:block>"#,
        )
        .globals(json!({"rows": [[1, 2], [3]]}))
        .render()?;
        assert_eq!(out, "00;01;10;");
        Ok(())
    }

    #[test]
    fn test_define_scopes() -> TestResult {
        let out = Fixture::new(
            r#"<div tal:define="x string:outer; global g string:root"><p tal:define="x string:inner" tal:content="x"/><span tal:content="x"/></div><b tal:content="g"/><i tal:define="set g string:again" tal:content="g"/>"#,
        )
        .render()?;
        assert_eq!(
            out,
            "<div><p>inner</p><span>outer</span></div><b>root</b><i>again</i>"
        );
        Ok(())
    }

    #[test]
    fn test_set_without_binding_fails() -> TestResult {
        let err = Fixture::new(r#"<p tal:define="set missing 1"/>"#)
            .try_render()?
            .unwrap_err();
        assert_eq!(err.kind, RenderErrorKind::Expression);
        Ok(())
    }

    #[test]
    fn test_on_error_replaces_failed_subtree() -> TestResult {
        let out = Fixture::new(
            "<div>before<p tal:on-error=\"string:failed ${error/type}\">\n<b tal:content=\"user/missing\">x</b></p>after</div>",
        )
        .globals(json!({"user": {}}))
        .render()?;
        assert_eq!(out, "<div>beforefailed LookupErrorafter</div>");
        Ok(())
    }

    #[test]
    fn test_unguarded_error_carries_location() -> TestResult {
        let err = Fixture::new("<html>\n  <p tal:content=\"missing\"/>\n</html>")
            .try_render()?
            .unwrap_err();
        assert_eq!(err.kind, RenderErrorKind::Expression);
        let location = err.location.expect("location");
        assert_eq!(location.line, 2);
        assert_eq!(location.filename.as_deref(), Some("page.pt"));
        Ok(())
    }

    #[test]
    fn test_omit_tag() -> TestResult {
        let out = Fixture::new(
            r#"<a tal:omit-tag="">one</a><b tal:omit-tag="flag">two</b><c tal:omit-tag="not: flag">three</c>"#,
        )
        .globals(json!({"flag": true}))
        .render()?;
        assert_eq!(out, "onetwo<c>three</c>");
        Ok(())
    }

    #[test]
    fn test_two_slot_macro_with_one_fill() -> TestResult {
        let out = Fixture::new(
            r#"<tal:block tal:condition="nothing"><div metal:define-macro="page"><h1 metal:define-slot="title">Default title</h1><p metal:define-slot="body">Default body</p></div></tal:block><section metal:use-macro="macros/page"><b metal:fill-slot="body">Filled</b></section>"#,
        )
        .render()?;
        assert_eq!(out, "<div><h1>Default title</h1><b>Filled</b></div>");
        Ok(())
    }

    #[test]
    fn test_macro_renders_in_place_with_defaults() -> TestResult {
        let out = Fixture::new(
            r#"<p metal:define-macro="m"><b metal:define-slot="s">default</b></p>"#,
        )
        .render()?;
        assert_eq!(out, "<p><b>default</b></p>");
        Ok(())
    }

    #[test]
    fn test_recursive_countdown() -> TestResult {
        let out = Fixture::new(concat!(
            r#"<tal:block tal:condition="nothing">"#,
            r#"<tal:block metal:define-macro="countdown" metal:define-param="int count">"#,
            r#"Count=<tal:block tal:replace="count"/>;"#,
            r#"<tal:block tal:condition="host:count > 1" metal:use-macro="macros/countdown" metal:fill-param="count host:count - 1"/>"#,
            r#"</tal:block></tal:block>"#,
            r#"<tal:block metal:use-macro="macros/countdown" metal:fill-param="count 5"/>"#,
        ))
        .render()?;
        assert_eq!(out, "Count=5;Count=4;Count=3;Count=2;Count=1;");
        Ok(())
    }

    #[test]
    fn test_param_defaults_and_coercion() -> TestResult {
        let out = Fixture::new(concat!(
            r#"<tal:block tal:condition="nothing">"#,
            r#"<i metal:define-macro="m" metal:define-param="int n 7; str label" tal:content="string:$n/${label | nothing}"/>"#,
            r#"</tal:block>"#,
            r#"<p metal:use-macro="macros/m"/>"#,
            r#"<p metal:use-macro="macros/m" metal:fill-param="n string:3; label string:x"/>"#,
        ))
        .render()?;
        assert_eq!(out, "<i>7/</i><i>3/x</i>");
        let err = Fixture::new(concat!(
            r#"<i metal:define-macro="m" metal:define-param="int n" tal:condition="nothing"/>"#,
            r#"<p metal:use-macro="macros/m" metal:fill-param="n string:seven"/>"#,
        ))
        .try_render()?
        .unwrap_err();
        assert_eq!(err.kind, RenderErrorKind::Type);
        Ok(())
    }

    #[test]
    fn test_slot_fill_from_imported_macro() -> TestResult {
        let out = Fixture::new(
            r#"<tal:block metal:import="lib:lib.pt"/><div metal:use-macro="lib/macros/card"><tal:block metal:fill-slot="body" tal:replace="name"/></div>"#,
        )
        .import(
            "lib.pt",
            r#"<article metal:define-macro="card"><h2 metal:define-slot="body">?</h2></article>"#,
        )
        .globals(json!({"name": "Ada"}))
        .render()?;
        assert_eq!(out, "<article>Ada</article>");
        Ok(())
    }

    #[test]
    fn test_fills_do_not_leak_into_nested_calls() -> TestResult {
        let out = Fixture::new(concat!(
            r#"<tal:block tal:condition="nothing">"#,
            r#"<em metal:define-macro="inner"><tal:block metal:define-slot="s">inner default</tal:block></em>"#,
            r#"<b metal:define-macro="outer"><tal:block metal:define-slot="s">outer default</tal:block>|<tal:block metal:use-macro="macros/inner"/></b>"#,
            r#"</tal:block>"#,
            r#"<tal:block metal:use-macro="macros/outer"><tal:block metal:fill-slot="s">filled</tal:block></tal:block>"#,
        ))
        .render()?;
        assert_eq!(out, "<b>filled|<em>inner default</em></b>");
        Ok(())
    }

    #[test]
    fn test_dynamic_macro_reference() -> TestResult {
        let out = Fixture::new(concat!(
            r#"<tal:block tal:condition="nothing"><i metal:define-macro="a">A</i><i metal:define-macro="b">B</i></tal:block>"#,
            r#"<tal:block tal:repeat="m host:[macros.b, macros.a]"><p metal:use-macro="m"/></tal:block>"#,
        ))
        .render()?;
        assert_eq!(out, "<i>B</i><i>A</i>");
        Ok(())
    }

    #[test]
    fn test_dynamic_target_must_be_a_macro() -> TestResult {
        let err = Fixture::new(r#"<p metal:use-macro="chosen"/>"#)
            .globals(json!({"chosen": "nope"}))
            .try_render()?
            .unwrap_err();
        assert_eq!(err.kind, RenderErrorKind::MacroResolution);

        let out = Fixture::new(
            r#"<div tal:on-error="string:${error/type}"><p metal:use-macro="chosen"/></div>"#,
        )
        .globals(json!({"chosen": 1}))
        .render()?;
        assert_eq!(out, "MacroResolutionError");
        Ok(())
    }

    #[test]
    fn test_host_expressions_with_libraries() -> TestResult {
        let out = Fixture::new(
            r#"<p tal:content="host:upper(name) + '!'"/><b tal:condition="host:len(items) >= 2" tal:content="host:max(items)"/>"#,
        )
        .dependency("text")
        .dependency("math")
        .globals(json!({"name": "ada", "items": [3, 9, 4]}))
        .render()?;
        assert_eq!(out, "<p>ADA!</p><b>9</b>");
        Ok(())
    }

    #[test]
    fn test_host_function_needs_its_library() -> TestResult {
        init_logger();
        let program = Compiler::default().compile(r#"<p tal:content="host:upper(x)"/>"#, None)?;
        let empty = BTreeSet::new();
        let no_globals = BTreeMap::new();
        let compiled = CompiledProgram {
            key: TemplateKey::derive(&KeyInputs {
                template: "",
                mode: TemplateMode::Markup,
                filename: None,
                imports: &[],
                global_types: &no_globals,
                dependencies: &empty,
            }),
            program,
            generator_version: GENERATOR_VERSION.to_string(),
            global_types: no_globals,
            dependencies: empty,
        };
        let err = InterpreterBackend.compile(&compiled).unwrap_err();
        assert!(err.to_string().contains("upper"));
        Ok(())
    }
}
