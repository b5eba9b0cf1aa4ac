use approx::assert_relative_eq;
use heatsim::comm::LocalUniverse;
use heatsim::grid::Grid;
use heatsim::stencil::HeatDiffusion;
use heatsim::traits::{ProcessGroup, Stencil};
use heatsim::types::{Error, TransportError};
use heatsim::{run, SimulationOptions};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Heat diffusion on the whole periodic field in one piece
fn serial_reference(field: &Grid, alpha: f64, steps: usize) -> Vec<f64> {
    let (w, h) = (field.width(), field.height());
    let mut u = field.data().to_vec();
    for _ in 0..steps {
        let mut next = vec![0.0; w * h];
        for y in 0..h {
            for x in 0..w {
                let at = |x: usize, y: usize| u[y * w + x];
                let c = at(x, y);
                let neighbours = at(x, (y + h - 1) % h)
                    + at(x, (y + 1) % h)
                    + at((x + w - 1) % w, y)
                    + at((x + 1) % w, y);
                next[y * w + x] = c + alpha * (neighbours - 4.0 * c);
            }
        }
        u = next;
    }
    u
}

fn random_field(seed: u64, width: usize, height: usize) -> Grid {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..width * height)
        .map(|_| rng.gen_range(0.0..100.0))
        .collect::<Vec<_>>();
    Grid::from_interior(width, height, 0, &values).unwrap()
}

fn run_on(
    universe: &LocalUniverse,
    options: &SimulationOptions,
    field: &Grid,
    stencil: &impl Stencil,
) -> Vec<Result<Option<Grid>, Error>> {
    universe.run(|local| {
        let field = (local.rank() == 0).then_some(field);
        run(&local, options, field, stencil)
    })
}

#[test]
fn test_matches_serial_diffusion() {
    let alpha = 0.2;
    let steps = 12;
    let stencil = HeatDiffusion::new(alpha).unwrap();
    let cases = [([1, 1], 6, 5), ([2, 2], 9, 7), ([3, 2], 11, 8), ([1, 3], 5, 10)];
    for (dims, width, height) in cases {
        let field = random_field(5, width, height);
        let mut options = SimulationOptions::default();
        options.set_dims(dims).set_steps(steps);
        let universe = LocalUniverse::new(dims[0] * dims[1]);
        let results = run_on(&universe, &options, &field, &stencil);

        let mut results = results.into_iter();
        let result = results.next().unwrap().unwrap().unwrap();
        assert!(results.all(|r| matches!(r, Ok(None))));
        assert_eq!(result.width(), width);
        assert_eq!(result.height(), height);
        assert_eq!(result.padding(), 0);

        let expected = serial_reference(&field, alpha, steps);
        for (a, b) in result.data().iter().zip(&expected) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_heat_is_conserved() {
    let field = random_field(9, 16, 12);
    let mut options = SimulationOptions::default();
    options.set_dims([2, 3]).set_steps(30);
    let results = run_on(&LocalUniverse::new(6), &options, &field, &HeatDiffusion::default());
    let result = results[0].as_ref().unwrap().as_ref().unwrap();
    assert_relative_eq!(
        result.data().iter().sum::<f64>(),
        field.data().iter().sum::<f64>(),
        max_relative = 1e-12
    );
}

/// Adds to each cell the number of its four neighbours holding one
struct CountBorders;

impl Stencil for CountBorders {
    fn update(&self, grid: &Grid) -> Grid {
        let mut next = grid.clone();
        let (w, h) = (grid.width() as isize, grid.height() as isize);
        for y in 0..h {
            for x in 0..w {
                let seen = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                    .iter()
                    .filter(|(i, j)| *grid.get_cell(*i, *j).unwrap() == 1.0)
                    .count();
                *next.get_cell_mut(x, y).unwrap() += seen as f64;
            }
        }
        next
    }
}

#[test]
fn test_stencil_sees_current_borders() {
    // Every cell starts at one, so each sees four neighbours of one after the first exchange
    let field = Grid::from_interior(6, 6, 0, &[1.0; 36]).unwrap();
    let mut options = SimulationOptions::default();
    options.set_dims([3, 3]).set_steps(1);
    let results = run_on(&LocalUniverse::new(9), &options, &field, &CountBorders);
    let result = results[0].as_ref().unwrap().as_ref().unwrap();
    assert!(result.data().iter().all(|v| *v == 5.0));
}

#[test]
fn test_receive_failure_stops_the_run() {
    let field = random_field(1, 8, 8);
    let mut options = SimulationOptions::default();
    options.set_dims([2, 2]).set_steps(3);
    let universe = LocalUniverse::new(4).fail_receives_on(1);
    let results = run_on(&universe, &options, &field, &HeatDiffusion::default());

    match &results[1] {
        Err(e @ Error::Transfer { rank: 1, peer: 0, .. }) => assert_eq!(e.operation(), "receive"),
        other => panic!("expected a transfer error on rank 1, got {other:?}"),
    }
    assert!(results[0].is_err());
    assert!(results.iter().all(|r| !matches!(r, Ok(Some(_)))));
}

/// Diffuses like [HeatDiffusion] but fails on any tile holding a negative cell
struct RejectNegative;

impl Stencil for RejectNegative {
    fn update(&self, grid: &Grid) -> Grid {
        if grid.interior_values().iter().any(|v| *v < 0.0) {
            panic!("negative temperature");
        }
        HeatDiffusion::default().update(grid)
    }
}

#[test]
#[should_panic(expected = "negative temperature")]
fn test_panicking_stencil_ends_the_run() {
    // Cell (5, 1) lies in the tile of rank 2 at (1, 0)
    let mut field = Grid::new(8, 8, 0);
    *field.get_cell_mut(5, 1).unwrap() = -1.0;
    let mut options = SimulationOptions::default();
    options.set_dims([2, 2]).set_steps(4);
    run_on(&LocalUniverse::new(4), &options, &field, &RejectNegative);
}

#[test]
fn test_failed_collection_stops_the_run() {
    // Without steps the coordinator's first receive is the result gather
    let field = random_field(2, 6, 6);
    let mut options = SimulationOptions::default();
    options.set_dims([3, 1]).set_steps(0);
    let universe = LocalUniverse::new(3).fail_receives_on(0);
    let results = run_on(&universe, &options, &field, &HeatDiffusion::default());

    assert!(matches!(
        results[0],
        Err(Error::Collection {
            rank: 0,
            source: TransportError::Injected,
            ..
        })
    ));
    assert!(results[1..].iter().all(|r| matches!(r, Ok(None))));
}
