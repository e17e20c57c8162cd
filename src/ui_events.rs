use crate::app_state::State;
use crate::field::FieldConfig;


#[derive(Debug)]
pub enum UserCommand {
    /// Replace the tunables and restart the field with them.
    SetConfig(FieldConfig),
    /// Scatter a fresh population with the current config.
    Restart,
    /// Stop animating; the last frame stays visible.
    Teardown,
    StateInitialized, // Notifies App that State setup is complete
}

impl State {
    pub fn process_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::SetConfig(config) => {
                log::info!("Applying field config with {} nodes.", config.node_count);
                self.field_config = config;
                self.start_field();
            }
            UserCommand::Restart => {
                log::info!("Restarting node field.");
                self.start_field();
            }
            UserCommand::Teardown => {
                log::info!("Tearing down node field.");
                self.stop_field();
            }
            UserCommand::StateInitialized => {
                // This command is handled in App::user_event
            }
        }
    }
}
