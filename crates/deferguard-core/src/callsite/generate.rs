//! Call text generation for insert mode.

use crate::config::GuardConfig;
use crate::syntax::is_blank;
use crate::types::{ResolvedParam, Type};

/// Name of the leading context parameter, when the toggle is on and the
/// first parameter is a named value of the context type.
pub fn context_param<'a>(config: &GuardConfig, params: &'a [ResolvedParam]) -> Option<&'a str> {
    if !config.context_param {
        return None;
    }
    let first = params.first()?;
    let name = first.name.as_deref().filter(|n| !is_blank(n))?;
    config.context_type.matches(&first.ty).then_some(name)
}

/// Render the deferred call statement for a declaration.
///
/// Without printable names the minimal form `defer P.N(ctx)(ctx)` is used.
/// Otherwise the formatted variant carries one fragment per named
/// parameter and one per named result, results passed by address.
pub fn render_call(
    config: &GuardConfig,
    params: &[ResolvedParam],
    results: &[ResolvedParam],
) -> String {
    let package = config.call.package_ident();
    let context = context_param(config, params);
    let rest = if context.is_some() { &params[1..] } else { params };

    let inner = Fragments::collect(rest, config.string_preview, "");
    let outer = Fragments::collect(results, config.string_preview, "&");

    let lead: Vec<String> = context.map(str::to_string).into_iter().collect();
    if inner.is_empty() && outer.is_empty() {
        let ctx = lead.join(", ");
        return format!("defer {}.{}({ctx})({ctx})", package, config.call.name);
    }
    format!(
        "defer {}.{}{}({})({})",
        package,
        config.call.name,
        config.format_suffix,
        inner.arguments(&lead),
        outer.arguments(&lead)
    )
}

#[derive(Default)]
struct Fragments {
    format: Vec<String>,
    args: Vec<String>,
}

impl Fragments {
    fn collect(params: &[ResolvedParam], preview: usize, prefix: &str) -> Self {
        let mut fragments = Self::default();
        for param in params {
            let Some(name) = param.name.as_deref().filter(|n| !is_blank(n)) else {
                continue;
            };
            match &param.ty {
                Type::Invalid(_) => {
                    fragments.format.push(format!("{name}="));
                    continue;
                }
                ty if ty.is_string() && !param.variadic => {
                    fragments.format.push(format!("{name}=%.{preview}q"))
                }
                _ => fragments.format.push(format!("{name}=%v")),
            }
            fragments.args.push(format!("{prefix}{name}"));
        }
        fragments
    }

    fn is_empty(&self) -> bool {
        self.format.is_empty()
    }

    fn arguments(&self, lead: &[String]) -> String {
        let mut all = lead.to_vec();
        all.push(format!("\"{}\"", self.format.join(" ")));
        all.extend(self.args.iter().cloned());
        all.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallSpec;
    use crate::types::UNIVERSE;

    fn param(name: &str, ty: Type) -> ResolvedParam {
        ResolvedParam {
            name: Some(name.to_string()),
            ty,
            variadic: false,
        }
    }

    fn config() -> GuardConfig {
        GuardConfig {
            call: CallSpec::parse("example.com/trace", "Enter").unwrap(),
            ..GuardConfig::default()
        }
    }

    fn ctx() -> ResolvedParam {
        param("ctx", Type::named("context", "Context"))
    }

    #[test]
    fn test_minimal_forms() {
        assert_eq!(render_call(&config(), &[], &[]), "defer trace.Enter()()");
        assert_eq!(render_call(&config(), &[ctx()], &[]), "defer trace.Enter(ctx)(ctx)");

        let unnamed = ResolvedParam {
            name: None,
            ty: Type::basic("int"),
            variadic: false,
        };
        let blank = param("_", Type::basic("string"));
        assert_eq!(
            render_call(&config(), &[ctx(), blank], &[unnamed]),
            "defer trace.Enter(ctx)(ctx)"
        );
    }

    #[test]
    fn test_formatted_form() {
        let params = [
            ctx(),
            param("key", Type::basic("string")),
            param("n", Type::basic("int")),
        ];
        let results = [
            param("value", Type::basic("string")),
            param("err", Type::named(UNIVERSE, "error")),
        ];
        assert_eq!(
            render_call(&config(), &params, &results),
            "defer trace.Enterf(ctx, \"key=%.64q n=%v\", key, n)(ctx, \"value=%.64q err=%v\", &value, &err)"
        );
    }

    #[test]
    fn test_context_toggle_and_special_params() {
        let mut config = config();
        config.context_param = false;
        config.string_preview = 16;
        let params = [
            ctx(),
            param("ref", Type::Invalid("C.int".to_string())),
            ResolvedParam {
                name: Some("rest".to_string()),
                ty: Type::Slice(Box::new(Type::basic("string"))),
                variadic: true,
            },
        ];
        assert_eq!(
            render_call(&config, &params, &[]),
            "defer trace.Enterf(\"ctx=%v ref= rest=%v\", ctx, rest)(\"\")"
        );
    }

    #[test]
    fn test_context_must_lead() {
        let params = [param("n", Type::basic("int")), ctx()];
        assert_eq!(context_param(&config(), &params), None);
        assert_eq!(context_param(&config(), &[ctx()]), Some("ctx"));
    }
}
