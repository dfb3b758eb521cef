//! `OpenAPI` description of a resource's routes.
//!
//! ```rust,ignore
//! let doc = posts.openapi("/posts");
//! let json = doc.to_pretty_json()?;
//! ```

use sea_orm::EntityTrait;
use utoipa::openapi::{
    ComponentsBuilder, ContentBuilder, HttpMethod, InfoBuilder, OpenApi, OpenApiBuilder,
    PathItem, PathsBuilder, Ref, RefOr, Required, ResponseBuilder, Schema,
    path::{Operation, OperationBuilder, ParameterBuilder, ParameterIn, PathItemBuilder},
    request_body::RequestBodyBuilder,
    schema::{ObjectBuilder, Type},
};
use utoipa::{IntoParams, ToSchema};

use crate::core::{Operation as ResourceOperation, Resource};
use crate::models::ListParams;
use crate::response::{ListMeta, ListResponse};

const JSON: &str = "application/json";

impl<E> Resource<E>
where
    E: EntityTrait,
    E::ActiveModel: Send,
{
    /// Document the allowed operations, mounted under `mount_path` (e.g. `/posts`)
    #[must_use]
    pub fn openapi(&self, mount_path: &str) -> OpenApi {
        let mount = mount_path.trim_end_matches('/');
        let mut collection = PathItemBuilder::new();
        let mut item = PathItemBuilder::new();

        for operation in ResourceOperation::ALL {
            if !self.options().allows(operation) {
                continue;
            }
            let documented = self.document(operation);
            match operation {
                ResourceOperation::List => {
                    collection = collection.operation(HttpMethod::Get, documented);
                }
                ResourceOperation::Create => {
                    collection = collection.operation(HttpMethod::Post, documented);
                }
                ResourceOperation::Detail => item = item.operation(HttpMethod::Get, documented),
                ResourceOperation::Patch => item = item.operation(HttpMethod::Patch, documented),
                ResourceOperation::Delete => item = item.operation(HttpMethod::Delete, documented),
            }
        }

        let collection: PathItem = collection.build();
        let item: PathItem = item.build();
        let paths = PathsBuilder::new()
            .path(if mount.is_empty() { "/" } else { mount }, collection)
            .path(format!("{mount}/{{id}}"), item)
            .build();

        let components = ComponentsBuilder::new()
            .schema_from::<ListMeta>()
            .schema_from::<ListResponse>()
            .build();

        OpenApiBuilder::new()
            .info(
                InfoBuilder::new()
                    .title(self.name())
                    .version(env!("CARGO_PKG_VERSION"))
                    .build(),
            )
            .paths(paths)
            .components(Some(components))
            .build()
    }

    fn document(&self, operation: ResourceOperation) -> Operation {
        let name = self.name();
        let builder = OperationBuilder::new()
            .tag(name)
            .response("400", ResponseBuilder::new().description("Bad request").build())
            .response("401", ResponseBuilder::new().description("Access denied").build());

        match operation {
            ResourceOperation::List => builder
                .operation_id(Some(format!("list_{name}")))
                .summary(Some(format!("List {name}")))
                .description(Some(self.filter_description()))
                .parameters(Some(ListParams::into_params(|| Some(ParameterIn::Query))))
                .response("200", json_response("One page of rows", ListResponse::name())),
            ResourceOperation::Detail => builder
                .operation_id(Some(format!("get_{name}")))
                .summary(Some(format!("Get one {name} by id")))
                .parameter(id_parameter())
                .response("200", object_response("The row"))
                .response("404", ResponseBuilder::new().description("Not found").build()),
            ResourceOperation::Create => builder
                .operation_id(Some(format!("create_{name}")))
                .summary(Some(format!("Create one {name}")))
                .request_body(Some(object_body()))
                .response("201", object_response("The created row")),
            ResourceOperation::Patch => builder
                .operation_id(Some(format!("patch_{name}")))
                .summary(Some(format!("Update one {name}")))
                .parameter(id_parameter())
                .request_body(Some(object_body()))
                .response("201", object_response("The updated row"))
                .response("404", ResponseBuilder::new().description("Not found").build()),
            ResourceOperation::Delete => builder
                .operation_id(Some(format!("delete_{name}")))
                .summary(Some(format!("Delete one {name}")))
                .parameter(id_parameter())
                .response("204", ResponseBuilder::new().description("Deleted").build()),
        }
        .build()
    }

    fn filter_description(&self) -> String {
        let fields: String = self
            .fields()
            .names()
            .into_iter()
            .map(|name| format!("\n- `{name}`"))
            .collect();
        format!(
            "Every query key other than `limit`, `offset` and `order_by` filters the rows: \
             `field[__relationField][__modifier]=value`, with modifiers `gt`, `gte`, `lt`, \
             `lte`, `in`, `not_in` and `not`.\n\nFilterable fields:{fields}"
        )
    }
}

fn id_parameter() -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name("id")
        .parameter_in(ParameterIn::Path)
        .required(Required::True)
        .description(Some("Positive integer primary key"))
        .schema(Some(RefOr::T(Schema::Object(
            ObjectBuilder::new().schema_type(Type::Integer).build(),
        ))))
        .build()
}

fn any_object() -> RefOr<Schema> {
    RefOr::T(Schema::Object(ObjectBuilder::new().schema_type(Type::Object).build()))
}

fn object_body() -> utoipa::openapi::request_body::RequestBody {
    RequestBodyBuilder::new()
        .content(JSON, ContentBuilder::new().schema(Some(any_object())).build())
        .required(Some(Required::True))
        .build()
}

fn object_response(description: &str) -> utoipa::openapi::Response {
    ResponseBuilder::new()
        .description(description)
        .content(JSON, ContentBuilder::new().schema(Some(any_object())).build())
        .build()
}

fn json_response(description: &str, schema: impl AsRef<str>) -> utoipa::openapi::Response {
    ResponseBuilder::new()
        .description(description)
        .content(
            JSON,
            ContentBuilder::new()
                .schema(Some(Ref::from_schema_name(schema.as_ref())))
                .build(),
        )
        .build()
}
