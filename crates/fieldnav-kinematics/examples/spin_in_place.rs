use fieldnav_kinematics::*;

fn main() {
    let limit = 0.3;
    let cmd = VelocityCommand::new(0.0, 0.3); // the controller's initial turn
    let dt = 0.11; // one control period
    let exit_heading = 5.9341;

    let model = match Unicycle::new(limit) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Failed to build unicycle model: {:?}", e);
            return;
        }
    };

    println!("Spinning at {} until the wrapped heading passes {} rad", cmd, exit_heading);
    let mut pose = Pose::default();
    let mut step = 0;
    while pose.wrapped_heading() <= exit_heading {
        match model.update_pose(pose, cmd, dt) {
            Ok(next) => pose = next,
            Err(e) => {
                eprintln!("Error during step {}: {:?}", step, e);
                return;
            }
        }
        step += 1;
    }

    println!("Turn complete after {} steps ({:.2} s)", step, step as f64 * dt);
    println!("Final pose: {}", pose);
    println!("Published as: {:?}", TwistMsg::from(cmd));
}
