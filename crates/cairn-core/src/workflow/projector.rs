//! Projection of built steps into transport definition records.

use cairn_types::definition::{DefinitionKind, OverDefinition, StepDefinition};

use super::step::{Over, Step};

/// Flatten `step` and its descendants into a `StepDefinition`.
///
/// The `when` key is only emitted for conditions other than `Always`.
pub fn project(step: &Step) -> StepDefinition {
    let common = step.common();
    let kind = match step {
        Step::Workflow(workflow) => DefinitionKind::Workflow {
            steps: workflow.children.iter().map(project).collect(),
        },
        Step::Resource(resource) => DefinitionKind::Resource {
            resource_type: resource.resource_type().to_string(),
            external_id: resource.external_id.clone(),
        },
        Step::StateHandler(handler) => DefinitionKind::StateHandler {
            interface: handler.interface.type_name.clone(),
        },
        Step::Action(action) => DefinitionKind::Action {
            interface: action.interface(),
        },
        Step::Iterator(iterator) => DefinitionKind::Iterator {
            iteration_style: iterator.style,
            over: match &iterator.over {
                Over::Value(value) => OverDefinition::Value(value.clone()),
                Over::Parameter(parameter) => OverDefinition::Parameter(parameter.clone()),
            },
            variables: iterator.variables.clone(),
            into: Some(iterator.into.clone()).filter(|into| !into.is_empty()),
            producer: Box::new(project(&iterator.producer)),
        },
        Step::Call(call) => DefinitionKind::Call {
            reference: call.target.clone(),
        },
        Step::Reference(reference) => DefinitionKind::Reference {
            reference: reference.target.clone(),
        },
    };

    StepDefinition {
        parameters: common.parameters.clone(),
        returns: common.returns.clone(),
        when: (!common.when.is_always()).then(|| common.when.to_string()),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::builder::{
        CompositeBuilder, IteratorBuilder, StepBuilder, WorkflowBuilder, build_step,
    };
    use crate::workflow::callable::Callable;
    use cairn_types::parameter::Parameter;
    use cairn_types::step::StepStyle;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct CopyInput {
        src: String,
    }

    #[derive(Debug, Serialize, JsonSchema)]
    struct CopyOutput {
        bytes: u64,
    }

    #[derive(Debug, Default, Serialize, JsonSchema)]
    struct BucketState {
        name: String,
    }

    fn copy() -> Callable {
        Callable::from_fn(|_: CopyInput| Ok::<_, String>(CopyOutput { bytes: 0 }))
    }

    fn deploy() -> Step {
        build_step::<WorkflowBuilder>(|w| {
            w.name("deploy").parameters([Parameter::new("region", "string")]);
            w.resource(|r| {
                r.name("bucket")
                    .external_id("bkt")
                    .when("enabled")
                    .state_struct(&BucketState::default());
            });
            w.iterator(|i| {
                i.name("copies").over(3);
                i.action(|a| {
                    a.name("copy").doer(copy());
                });
            });
            w.reference(|r| {
                r.name("cleanup").call_to("maintenance::cleanup");
            });
        })
        .unwrap()
    }

    #[test]
    fn test_workflow_projects_children_in_order() {
        let definition = project(&deploy());
        assert_eq!(definition.style(), StepStyle::Workflow);
        let DefinitionKind::Workflow { steps } = &definition.kind else {
            panic!("expected workflow, got: {:?}", definition.kind);
        };
        let styles: Vec<_> = steps.iter().map(StepDefinition::style).collect();
        assert_eq!(
            styles,
            vec![StepStyle::Resource, StepStyle::Iterator, StepStyle::Reference]
        );
        assert_eq!(steps[0].when.as_deref(), Some("enabled"));
        assert!(steps[1].when.is_none());
    }

    #[test]
    fn test_record_shape_of_workflow() {
        let record = project(&deploy()).to_record().unwrap();
        assert_eq!(record["style"], json!("workflow"));
        assert_eq!(record["parameters"][0]["name"], json!("region"));
        assert!(record.get("returns").is_none());

        let bucket = &record["steps"][0];
        assert!(bucket["resourceType"].as_str().unwrap().ends_with("BucketState"));
        assert_eq!(bucket["externalId"], json!("bkt"));

        let copies = &record["steps"][1];
        assert_eq!(copies["iterationStyle"], json!("times"));
        assert_eq!(copies["over"], json!({"value": 3}));
        assert_eq!(copies["into"], json!("copies"));
        assert_eq!(copies["producer"]["style"], json!("action"));
        assert!(
            copies["producer"]["interface"]
                .as_str()
                .unwrap()
                .ends_with(", error)")
        );

        assert_eq!(record["steps"][2]["reference"], json!("maintenance::cleanup"));
    }

    #[test]
    fn test_iterator_producer_matches_child_projection() {
        let step = build_step::<IteratorBuilder>(|i| {
            i.name("loop").over(2);
            i.action(|a| {
                a.name("copy").doer(copy());
            });
        })
        .unwrap();
        let definition = project(&step);
        let DefinitionKind::Iterator { producer, .. } = &definition.kind else {
            panic!("expected iterator");
        };
        assert_eq!(**producer, project(&step.children()[0]));
    }

    #[test]
    fn test_projection_is_idempotent() {
        let step = deploy();
        let before = step.clone();
        assert_eq!(project(&step), project(&step));
        assert_eq!(step, before);
    }
}
