//! Fields reassigned outside construction.

use crate::analysis::ClassFacts;

use super::call_graph::PrivateMethodCallGraph;
use super::var_stack::field_stores;
use super::{CheckContext, Checker, CodeLocation, MutabilityReason, MutableReasonDetail};

/// Flags stores into the object's own fields from methods that can run after
/// the constructor returned. Private helpers only called from constructors
/// are part of construction and pass.
pub struct SetterMethodChecker;

impl Checker for SetterMethodChecker {
    fn name(&self) -> &'static str {
        "setter_method"
    }

    fn check(&self, class: &ClassFacts, _ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
        let graph = PrivateMethodCallGraph::build(class);
        let mut reasons = Vec::new();

        let candidates = class
            .methods
            .iter()
            .filter(|m| !m.is_constructor() && !m.is_static() && m.has_code());

        for method in candidates {
            let stores: Vec<_> = field_stores(method)
                .into_iter()
                .filter(|s| s.involves_this() && s.field.owner == class.name)
                .collect();
            if stores.is_empty() {
                continue;
            }

            let id = method.id(&class.name);
            let reassigning = if method.is_private() {
                match graph.is_only_called_from_constructor(&id) {
                    Ok(constructor_only) => !constructor_only,
                    Err(err) => {
                        reasons.push(MutableReasonDetail::new(
                            MutabilityReason::CannotAnalyse,
                            CodeLocation::method(&class.name, &method.name, &method.descriptor, None),
                            err.to_string(),
                        ));
                        continue;
                    }
                }
            } else {
                true
            };
            if !reassigning {
                continue;
            }

            for store in stores {
                reasons.push(MutableReasonDetail::new(
                    MutabilityReason::FieldCanBeReassigned,
                    CodeLocation::method(&class.name, &method.name, &method.descriptor, Some(store.index)),
                    format!(
                        "Field [{}] can be reassigned within method [{}]",
                        store.field.name, method.name
                    ),
                ));
            }
        }

        Ok(reasons)
    }
}
