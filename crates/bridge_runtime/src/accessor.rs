//! Property reads and writes by wire name.

use std::any::Any;

use bridge_types::{Access, CollectionAction, NamingConvention, PatchError, PropertyDescription};
use serde_json::Value;

use crate::error::DispatchError;
use crate::property::{PropertyMeta, PropertyValue};
use crate::registry::TypeInfo;

/// Describe every property whose access includes `filter` (all when `None`)
///
/// Names are translated with `naming`; values are present only for readable
/// properties.
pub fn get_properties(
    type_info: &TypeInfo,
    instance: &dyn Any,
    filter: Option<Access>,
    naming: NamingConvention,
) -> Vec<PropertyDescription> {
    type_info
        .properties()
        .iter()
        .filter(|p| filter.is_none_or(|access| p.access().contains(access)))
        .map(|p| PropertyDescription {
            name: naming.apply(p.name()),
            value: if p.access().is_readable() {
                p.read(instance)
            } else {
                None
            },
            access: p.access(),
        })
        .collect()
}

/// Find a property by the name the UI knows it under
pub fn find_property<'a>(
    type_info: &'a TypeInfo,
    name: &str,
    naming: NamingConvention,
) -> Option<&'a PropertyMeta> {
    type_info
        .properties()
        .iter()
        .find(|p| p.name() == name || naming.apply(p.name()) == name)
}

fn find_writable<'a>(
    type_info: &'a TypeInfo,
    name: &str,
    naming: NamingConvention,
) -> Option<&'a PropertyMeta> {
    type_info
        .properties()
        .iter()
        .filter(|p| p.access().is_writable())
        .find(|p| p.name() == name || naming.apply(p.name()) == name)
}

/// Host-side write with exact type matching
///
/// Returns `Ok(false)` when no writable property matches or the value's type
/// is not exactly the declared type; neither is treated as a fault.
pub fn try_set_property(
    type_info: &TypeInfo,
    instance: &mut dyn Any,
    name: &str,
    value: PropertyValue,
    naming: NamingConvention,
) -> Result<bool, DispatchError> {
    if name.trim().is_empty() {
        return Err(DispatchError::InvalidArgument(
            "property name must not be blank".to_string(),
        ));
    }

    Ok(match find_writable(type_info, name, naming) {
        Some(property) => property.write_native(instance, value),
        None => false,
    })
}

/// Write a JSON value received from the UI into the declared type
pub fn write_wire(
    type_info: &TypeInfo,
    instance: &mut dyn Any,
    name: &str,
    value: &Value,
    naming: NamingConvention,
) -> bool {
    match find_writable(type_info, name, naming) {
        Some(property) => property.write_wire(instance, value),
        None => false,
    }
}

/// Apply collection actions received from the UI
///
/// Returns `Ok(false)` when no collection property matches `name`.
pub fn apply_collection(
    type_info: &TypeInfo,
    instance: &mut dyn Any,
    name: &str,
    actions: &[CollectionAction],
    naming: NamingConvention,
) -> Result<bool, PatchError> {
    let Some(property) = find_property(type_info, name, naming) else {
        return Ok(false);
    };
    match property.apply_actions(instance, actions) {
        Some(result) => result.map(|()| true),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ControllerType, TypeBuilder};
    use serde_json::json;

    #[derive(Default)]
    struct Settings {
        title: String,
        password: String,
        retries: u32,
        motd: Option<String>,
        items: Vec<i32>,
    }

    impl ControllerType for Settings {
        fn controller_name() -> &'static str {
            "Settings"
        }

        fn register(builder: &mut TypeBuilder<Self>) {
            builder
                .property("Title", |this: &Self| this.title.clone(), |this: &mut Self, v| this.title = v)
                .write_property("Password", |this: &mut Self, v: String| this.password = v)
                .read_property("Retries", |this: &Self| this.retries)
                .property("Motd", |this: &Self| this.motd.clone(), |this: &mut Self, v| this.motd = v)
                .collection("Items", |this: &Self| &this.items, |this: &mut Self| &mut this.items);
        }
    }

    #[test]
    fn test_get_properties_with_filter_and_naming() {
        let info = TypeInfo::build::<Settings>();
        let settings = Settings {
            title: "Main".to_string(),
            ..Default::default()
        };

        let all = get_properties(&info, &settings, None, NamingConvention::CamelCase);
        let names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "password", "retries", "motd", "items"]);
        assert_eq!(all[0].value, Some(json!("Main")));
        assert_eq!(all[1].value, None);

        let writable = get_properties(&info, &settings, Some(Access::WRITE), NamingConvention::Normal);
        let names: Vec<_> = writable.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Title", "Password", "Motd", "Items"]);
    }

    #[test]
    fn test_try_set_property_exact_type() {
        let info = TypeInfo::build::<Settings>();
        let mut settings = Settings::default();

        let set = |settings: &mut Settings, name: &str, value: PropertyValue| {
            try_set_property(&info, settings, name, value, NamingConvention::CamelCase).unwrap()
        };

        // Write-only property, wrong runtime type: rejected and untouched
        assert!(!set(&mut settings, "password", PropertyValue::native(42i32)));
        assert_eq!(settings.password, "");

        assert!(set(&mut settings, "password", PropertyValue::native("hunter2".to_string())));
        assert_eq!(settings.password, "hunter2");

        // &str is not String
        assert!(!set(&mut settings, "title", PropertyValue::native("x")));

        // Read-only and unknown properties are not writable
        assert!(!set(&mut settings, "retries", PropertyValue::native(3u32)));
        assert!(!set(&mut settings, "missing", PropertyValue::native(1u8)));
    }

    #[test]
    fn test_try_set_property_null() {
        let info = TypeInfo::build::<Settings>();
        let mut settings = Settings {
            motd: Some("hi".to_string()),
            ..Default::default()
        };

        assert!(try_set_property(&info, &mut settings, "Motd", PropertyValue::Null, NamingConvention::Normal).unwrap());
        assert_eq!(settings.motd, None);
        assert!(!try_set_property(&info, &mut settings, "Title", PropertyValue::Null, NamingConvention::Normal).unwrap());
    }

    #[test]
    fn test_blank_name_is_invalid() {
        let info = TypeInfo::build::<Settings>();
        let mut settings = Settings::default();
        assert!(matches!(
            try_set_property(&info, &mut settings, "", PropertyValue::Null, NamingConvention::Normal),
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_wire_writes_and_collections() {
        let info = TypeInfo::build::<Settings>();
        let mut settings = Settings::default();

        assert!(write_wire(&info, &mut settings, "title", &json!("New"), NamingConvention::CamelCase));
        assert_eq!(settings.title, "New");
        assert!(!write_wire(&info, &mut settings, "title", &json!(1), NamingConvention::CamelCase));

        let applied = apply_collection(
            &info,
            &mut settings,
            "items",
            &[CollectionAction::add(vec![json!(1), json!(2)], 0)],
            NamingConvention::CamelCase,
        );
        assert_eq!(applied, Ok(true));
        assert_eq!(settings.items, vec![1, 2]);

        assert_eq!(
            apply_collection(&info, &mut settings, "title", &[], NamingConvention::CamelCase),
            Ok(false)
        );
    }

    #[test]
    fn test_collection_patch_on_wrong_instance_fails() {
        let info = TypeInfo::build::<Settings>();
        let mut other = String::from("not settings");

        let err = apply_collection(
            &info,
            &mut other,
            "items",
            &[CollectionAction::add(vec![json!(1)], 0)],
            NamingConvention::CamelCase,
        )
        .unwrap_err();
        assert_eq!(err, PatchError::WrongInstance("Settings".to_string()));
        assert_eq!(other, "not settings");
    }
}
