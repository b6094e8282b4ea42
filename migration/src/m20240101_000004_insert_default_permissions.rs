use sea_orm_migration::prelude::*;
use serde_json::{Value, json};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 通用规则词表
const DEFAULT_RULES: [&str; 6] = ["list", "create", "read", "update", "delete", "menu"];

/// 只读规则
const READ_ONLY_RULES: [&str; 3] = ["list", "read", "menu"];

/// 使用通用规则词表的业务实体
const DEFAULT_ENTITIES: [&str; 22] = [
    "configs",
    "categories",
    "files",
    "gateways",
    "groups",
    "languages",
    "logs",
    "rules",
    "countries",
    "states",
    "cities",
    "keywords",
    "dashboards",
    "products",
    "tags",
    "flavors",
    "notifications",
    "blogs",
    "news",
    "orders",
    "coupons",
    "entities",
];

/// users 实体在通用规则之外的扩展规则
const USER_EXTRA_RULES: [&str; 3] = ["activation", "blocking", "change_password"];

fn user_rules() -> Vec<&'static str> {
    DEFAULT_RULES
        .iter()
        .chain(USER_EXTRA_RULES.iter())
        .copied()
        .collect()
}

fn catalog() -> Vec<(&'static str, Vec<&'static str>)> {
    let mut catalog: Vec<(&'static str, Vec<&'static str>)> = DEFAULT_ENTITIES
        .iter()
        .map(|entity| (*entity, DEFAULT_RULES.to_vec()))
        .collect();
    catalog.push(("users", user_rules()));
    catalog
}

fn permission(entity: &str, rules: &[&str]) -> Value {
    json!({ "entity": entity, "rules": rules })
}

fn super_admin_permissions() -> Value {
    Value::Array(
        catalog()
            .iter()
            .map(|(entity, rules)| permission(entity, rules))
            .collect(),
    )
}

fn admin_permissions() -> Value {
    Value::Array(
        catalog()
            .iter()
            .map(|(entity, rules)| match *entity {
                "rules" | "entities" => permission(entity, &READ_ONLY_RULES),
                _ => permission(entity, rules),
            })
            .collect(),
    )
}

fn customer_permissions() -> Value {
    json!([
        { "entity": "files", "rules": ["list", "read", "menu"] },
        { "entity": "categories", "rules": ["list", "read"] },
        { "entity": "products", "rules": ["list", "read", "menu"] },
    ])
}

fn audit_permissions() -> Value {
    Value::Array(
        catalog()
            .iter()
            .map(|(entity, _)| permission(entity, &READ_ONLY_RULES))
            .collect(),
    )
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 业务实体目录
        for (code_name, rules) in catalog() {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(Entities::Table)
                        .columns([Entities::CodeName, Entities::Rules])
                        .values_panic([code_name.into(), json!(rules).into()])
                        .to_owned(),
                )
                .await?;
        }

        // 默认分组
        let groups = [
            ("super_admin", "全部实体的全部规则", super_admin_permissions()),
            ("admin", "后台管理员", admin_permissions()),
            ("customer", "注册客户", customer_permissions()),
            ("audit", "只读审计", audit_permissions()),
        ];
        for (name, description, permissions) in groups {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(Groups::Table)
                        .columns([Groups::Name, Groups::Description, Groups::Permissions])
                        .values_panic([name.into(), description.into(), permissions.into()])
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Groups::Table)
                    .and_where(
                        Expr::col(Groups::Name).is_in(["super_admin", "admin", "customer", "audit"]),
                    )
                    .to_owned(),
            )
            .await?;

        let code_names: Vec<&str> = catalog().into_iter().map(|(name, _)| name).collect();
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Entities::Table)
                    .and_where(Expr::col(Entities::CodeName).is_in(code_names))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    Name,
    Description,
    Permissions,
}

#[derive(DeriveIden)]
enum Entities {
    Table,
    CodeName,
    Rules,
}
