//! Tic-tac-toe rules and the scripted opponent.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::board::{Board, Symbol};

/// The 8 winning triples: rows, columns, diagonals.
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

pub const CENTER: usize = 4;
pub const CORNERS: [usize; 4] = [0, 2, 6, 8];
pub const EDGES: [usize; 4] = [1, 3, 5, 7];

/// Shared symbol of the first fully matched triple, if any.
///
/// Only meaningful for 9-cell boards; any other size has no winner.
pub fn winner_of(board: &Board) -> Option<Symbol> {
    if board.len() != 9 {
        return None;
    }
    WIN_LINES.iter().find_map(|&[a, b, c]| {
        let first = board.value_at(a)?;
        (board.value_at(b) == Some(first) && board.value_at(c) == Some(first)).then_some(first)
    })
}

/// Every cell occupied and nobody won.
pub fn is_draw(board: &Board) -> bool {
    board.is_full() && winner_of(board).is_none()
}

/// Free position that would complete a line for `symbol`, in document order.
fn completing_move(board: &Board, symbol: Symbol) -> Option<usize> {
    board.free_positions().into_iter().find(|&position| {
        let mut trial = board.clone();
        trial.place(position, symbol) && winner_of(&trial) == Some(symbol)
    })
}

/// Pick the scripted opponent's move.
///
/// Priority: win, block, center, first free corner, first free edge,
/// then uniformly random among whatever is left. Returns `None` on a full board.
pub fn choose_opponent_move<R: Rng + ?Sized>(
    board: &Board,
    opponent: Symbol,
    player: Symbol,
    rng: &mut R,
) -> Option<usize> {
    let free = board.free_positions();
    if free.is_empty() {
        return None;
    }

    if let Some(position) = completing_move(board, opponent) {
        return Some(position);
    }
    if let Some(position) = completing_move(board, player) {
        return Some(position);
    }

    let is_free = |p: &usize| free.contains(p);
    if is_free(&CENTER) {
        return Some(CENTER);
    }
    if let Some(&corner) = CORNERS.iter().find(|p| is_free(p)) {
        return Some(corner);
    }
    if let Some(&edge) = EDGES.iter().find(|p| is_free(p)) {
        return Some(edge);
    }

    free.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardSize;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn board_from(marks: &str) -> Board {
        // 9 chars: 'X', 'O' or '.'
        let mut board = Board::default();
        for (i, ch) in marks.chars().enumerate() {
            match ch {
                'X' => {
                    board.place(i, Symbol::X);
                }
                'O' => {
                    board.place(i, Symbol::O);
                }
                _ => {}
            }
        }
        board
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_winner_on_every_line() {
        for line in WIN_LINES {
            for symbol in [Symbol::X, Symbol::O] {
                let mut board = Board::default();
                for p in line {
                    board.place(p, symbol);
                }
                assert_eq!(winner_of(&board), Some(symbol), "line {:?}", line);
            }
        }
    }

    #[test]
    fn test_no_winner_without_full_triple() {
        assert_eq!(winner_of(&Board::default()), None);
        assert_eq!(winner_of(&board_from("XX.......")), None);
        assert_eq!(winner_of(&board_from("XXO......")), None);
        assert_eq!(winner_of(&board_from("XOXOXOOXO")), None);
    }

    #[test]
    fn test_winner_matches_brute_force_over_all_boards() {
        // Every assignment of {empty, X, O} to the 9 cells
        for code in 0..3u32.pow(9) {
            let mut board = Board::default();
            let mut rest = code;
            for position in 0..9 {
                match rest % 3 {
                    1 => {
                        board.place(position, Symbol::X);
                    }
                    2 => {
                        board.place(position, Symbol::O);
                    }
                    _ => {}
                }
                rest /= 3;
            }

            let has_line = |symbol: Symbol| {
                WIN_LINES
                    .iter()
                    .any(|line| line.iter().all(|&p| board.value_at(p) == Some(symbol)))
            };
            match winner_of(&board) {
                Some(symbol) => assert!(has_line(symbol)),
                None => assert!(!has_line(Symbol::X) && !has_line(Symbol::O)),
            }
        }
    }

    #[test]
    fn test_draw_detection() {
        assert!(is_draw(&board_from("XOXXOOOXX")));
        assert!(!is_draw(&board_from("XOXXOOOX.")));
        assert!(!is_draw(&board_from("XXXOO.O..")));
    }

    #[test]
    fn test_non_classic_board_has_no_winner() {
        let board = Board::new(crate::board::BoardSize::Small);
        assert_eq!(winner_of(&board), None);
    }

    #[test]
    fn test_opponent_takes_win_over_block() {
        // O can win at 5; X threatens at 2
        let board = board_from("XX.OO....");
        let choice = choose_opponent_move(&board, Symbol::O, Symbol::X, &mut rng());
        assert_eq!(choice, Some(5));
    }

    #[test]
    fn test_opponent_blocks() {
        let board = board_from("XX..O....");
        let choice = choose_opponent_move(&board, Symbol::O, Symbol::X, &mut rng());
        assert_eq!(choice, Some(2));
    }

    #[test]
    fn test_opponent_prefers_center_then_corners() {
        let choice = choose_opponent_move(&Board::default(), Symbol::O, Symbol::X, &mut rng());
        assert_eq!(choice, Some(CENTER));

        // Center taken: first corner
        let choice =
            choose_opponent_move(&board_from("....X...."), Symbol::O, Symbol::X, &mut rng());
        assert_eq!(choice, Some(0));
    }

    #[test]
    fn test_opponent_blocks_before_taking_an_edge() {
        // X threatens 0-3-6 and 6-7-8; the first block in board order wins
        let choice =
            choose_opponent_move(&board_from("X.O.O.X.X"), Symbol::O, Symbol::X, &mut rng());
        assert_eq!(choice, Some(3));

        // X threatens 2-5-8
        let choice =
            choose_opponent_move(&board_from("XOX.O.OXX"), Symbol::O, Symbol::X, &mut rng());
        assert_eq!(choice, Some(5));
    }

    #[test]
    fn test_opponent_takes_first_free_edge_without_threats() {
        // Center and corners taken, edges 1 and 7 free, no line can be completed
        let board = board_from("X.OOXXX.O");
        assert!(completing_move(&board, Symbol::O).is_none());
        assert!(completing_move(&board, Symbol::X).is_none());

        let choice = choose_opponent_move(&board, Symbol::O, Symbol::X, &mut rng());
        assert_eq!(choice, Some(1));
    }

    #[test]
    fn test_opponent_falls_back_to_random_free_cell() {
        // Only the 4x4 board has cells outside the 3x3 priority lists
        let mut board = Board::new(BoardSize::Large);
        for position in 0..9 {
            let symbol = if position % 2 == 0 { Symbol::X } else { Symbol::O };
            board.place(position, symbol);
        }

        let mut first_rng = rng();
        let mut second_rng = rng();
        for _ in 0..20 {
            let choice = choose_opponent_move(&board, Symbol::O, Symbol::X, &mut first_rng);
            let position = choice.unwrap();
            assert!((9..16).contains(&position));
            assert!(board.get(position).unwrap().is_empty());
            assert_eq!(
                choose_opponent_move(&board, Symbol::O, Symbol::X, &mut second_rng),
                choice
            );
        }
    }

    #[test]
    fn test_opponent_never_picks_occupied_cell() {
        let mut rng = rng();
        for code in 0..3u32.pow(9) {
            let mut board = Board::default();
            let mut rest = code;
            for position in 0..9 {
                match rest % 3 {
                    1 => {
                        board.place(position, Symbol::X);
                    }
                    2 => {
                        board.place(position, Symbol::O);
                    }
                    _ => {}
                }
                rest /= 3;
            }

            match choose_opponent_move(&board, Symbol::O, Symbol::X, &mut rng) {
                Some(position) => {
                    assert!(board.get(position).unwrap().is_empty());
                    if let Some(win) = completing_move(&board, Symbol::O) {
                        assert_eq!(position, win);
                    }
                }
                None => assert!(board.is_full()),
            }
        }
    }

    #[test]
    fn test_full_board_has_no_move() {
        let board = board_from("XOXXOOOXX");
        assert_eq!(
            choose_opponent_move(&board, Symbol::O, Symbol::X, &mut rng()),
            None
        );
    }
}
