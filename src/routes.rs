pub mod common;
pub mod routes;

pub mod activities {
    pub mod activities_handlers;
    pub mod activities_models;
}

pub mod admin {
    pub mod admin_handlers;
    pub mod admin_models;
}

pub mod associations {
    pub mod associations_handlers;
    pub mod associations_models;
}

pub mod contacts {
    pub mod contacts_handlers;
    pub mod contacts_models;
}

pub mod groups {
    pub mod groups_handlers;
    pub mod groups_models;
}

pub mod import {
    pub mod import_handlers;
    pub mod import_models;
}

pub mod login {
    pub mod login_handlers;
    pub mod login_models;
}

pub mod municipalities {
    pub mod municipalities_handlers;
    pub mod municipalities_models;
}

pub mod notes {
    pub mod notes_handlers;
    pub mod notes_models;
}

pub mod tags {
    pub mod tags_handlers;
    pub mod tags_models;
}

pub mod tasks {
    pub mod tasks_handlers;
    pub mod tasks_models;
}
